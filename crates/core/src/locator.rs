//! First-successful-locator combinator over ordered selector strategies.
//!
//! A [`Cascade`] lists [`Step`]s from most to least specific. [`Locator::first`]
//! gives each step its own budget and returns the first hit; generic steps are
//! shorter and log a warning when they win so selectors can be tightened.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::browser::{BrowserPage, ElementHandle, PageDiagnostics, Strategy};
use crate::clock::{Clock, Deadline};
use crate::config::Timeouts;
use crate::error::QuillError;

#[derive(Debug, Clone)]
pub struct Step {
	pub label: &'static str,
	pub strategy: Strategy,
	/// Generic steps run on the fallback budget and warn when they match.
	pub generic: bool,
}

#[derive(Debug, Clone)]
pub struct Cascade {
	pub target: &'static str,
	pub steps: Vec<Step>,
}

impl Cascade {
	pub fn new(target: &'static str) -> Self {
		Self { target, steps: Vec::new() }
	}

	pub fn specific(mut self, label: &'static str, strategy: Strategy) -> Self {
		self.steps.push(Step {
			label,
			strategy,
			generic: false,
		});
		self
	}

	pub fn generic(mut self, label: &'static str, strategy: Strategy) -> Self {
		self.steps.push(Step {
			label,
			strategy,
			generic: true,
		});
		self
	}

	pub fn labels(&self) -> Vec<String> {
		self.steps.iter().map(|s| s.label.to_string()).collect()
	}
}

/// A hit: the element and which step produced it.
#[derive(Debug, Clone)]
pub struct Located {
	pub element: ElementHandle,
	pub step: &'static str,
	pub index: usize,
}

/// Every step of a cascade came up empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFound {
	pub target: &'static str,
	pub tried: Vec<String>,
}

impl NotFound {
	pub fn into_error(self, diagnostics: PageDiagnostics) -> QuillError {
		QuillError::ElementNotFound {
			target: self.target.to_string(),
			tried: self.tried,
			diagnostics: Box::new(diagnostics),
		}
	}
}

pub struct Locator<'a> {
	page: &'a dyn BrowserPage,
	clock: &'a dyn Clock,
	timeouts: &'a Timeouts,
}

impl<'a> Locator<'a> {
	pub fn new(page: &'a dyn BrowserPage, clock: &'a dyn Clock, timeouts: &'a Timeouts) -> Self {
		Self { page, clock, timeouts }
	}

	/// Tries each step in order, each polled until its own budget runs out.
	pub async fn first(&self, cascade: &Cascade) -> Result<Located, NotFound> {
		for (index, step) in cascade.steps.iter().enumerate() {
			let budget = if step.generic { self.timeouts.fallback } else { self.timeouts.element };
			if let Some(element) = self.poll(&step.strategy, budget).await {
				let located = Located {
					element,
					step: step.label,
					index,
				};
				log_hit(cascade, &located, step.generic);
				return Ok(located);
			}
			debug!(target = "quill.locator", element = cascade.target, step = step.label, "step missed");
		}
		Err(NotFound {
			target: cascade.target,
			tried: cascade.labels(),
		})
	}

	/// Sweeps all steps repeatedly within the short probe budget. Never fails.
	pub async fn probe(&self, cascade: &Cascade) -> Option<Located> {
		let deadline = Deadline::after(self.clock, self.timeouts.probe);
		loop {
			for (index, step) in cascade.steps.iter().enumerate() {
				if let Ok(Some(element)) = self.page.find(&step.strategy).await {
					let located = Located {
						element,
						step: step.label,
						index,
					};
					log_hit(cascade, &located, step.generic);
					return Some(located);
				}
			}
			if deadline.expired(self.clock) {
				debug!(target = "quill.locator", element = cascade.target, "optional element absent");
				return None;
			}
			self.clock.sleep(self.timeouts.poll_interval).await;
		}
	}

	/// Like [`Locator::first`], but a miss becomes `ElementNotFound` with page diagnostics.
	pub async fn require(&self, cascade: &Cascade) -> crate::Result<Located> {
		match self.first(cascade).await {
			Ok(located) => Ok(located),
			Err(missing) => {
				let diagnostics = self.page.diagnostics().await.unwrap_or_else(|err| {
					debug!(target = "quill.locator", error = %err, "diagnostics unavailable");
					PageDiagnostics::default()
				});
				warn!(
					target = "quill.locator",
					element = missing.target,
					url = %diagnostics.url,
					inputs = diagnostics.inputs.len(),
					"selector cascade exhausted"
				);
				Err(missing.into_error(diagnostics))
			}
		}
	}

	async fn poll(&self, strategy: &Strategy, budget: Duration) -> Option<ElementHandle> {
		let deadline = Deadline::after(self.clock, budget);
		loop {
			match self.page.find(strategy).await {
				Ok(Some(element)) => return Some(element),
				Ok(None) => {}
				Err(err) => debug!(target = "quill.locator", error = %err, "probe failed"),
			}
			if deadline.expired(self.clock) {
				return None;
			}
			self.clock.sleep(self.timeouts.poll_interval).await;
		}
	}
}

fn log_hit(cascade: &Cascade, located: &Located, generic: bool) {
	if generic {
		warn!(
			target = "quill.locator",
			element = cascade.target,
			step = located.step,
			matched = %located.element.label(),
			"matched by generic fallback"
		);
	} else if located.index > 0 {
		info!(target = "quill.locator", element = cascade.target, step = located.step, "matched by fallback step");
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;
	use crate::clock::ManualClock;
	use crate::testing::{FakeDocument, FakeElement, FakeSite};

	async fn page_with(elements: Vec<FakeElement>) -> (FakeSite, Arc<dyn BrowserPage>) {
		let site = FakeSite::new();
		site.add_document("https://example.test/", FakeDocument::new("Example").with_elements(elements));
		let page = site.open_page();
		page.goto("https://example.test/", Duration::from_secs(1)).await.unwrap();
		(site, page)
	}

	fn email_cascade() -> Cascade {
		Cascade::new("email input")
			.specific("type=email", Strategy::css(r#"input[type="email"]"#))
			.generic("any text input", Strategy::css(r#"input[type="text"], input:not([type])"#))
	}

	#[tokio::test]
	async fn specific_step_wins_over_generic() {
		let (_site, page) = page_with(vec![
			FakeElement::new("input").attr("type", "text").attr("name", "q"),
			FakeElement::new("input").attr("type", "email").attr("name", "email"),
		])
		.await;
		let clock = ManualClock::default();
		let timeouts = Timeouts::default();
		let located = Locator::new(page.as_ref(), &clock, &timeouts).first(&email_cascade()).await.unwrap();
		assert_eq!(located.step, "type=email");
		assert_eq!(located.element.attr("name"), Some("email"));
	}

	#[tokio::test]
	async fn falls_back_after_step_budget() {
		let (_site, page) = page_with(vec![FakeElement::new("input").attr("name", "q")]).await;
		let clock = ManualClock::default();
		let start = clock.now();
		let timeouts = Timeouts::default();
		let located = Locator::new(page.as_ref(), &clock, &timeouts).first(&email_cascade()).await.unwrap();
		assert_eq!(located.index, 1);
		assert!(crate::clock::age(clock.now(), start) >= timeouts.element);
	}

	#[tokio::test]
	async fn exhausted_cascade_reports_every_step() {
		let (_site, page) = page_with(vec![FakeElement::new("button").text("Go")]).await;
		let clock = ManualClock::default();
		let timeouts = Timeouts::default();
		let locator = Locator::new(page.as_ref(), &clock, &timeouts);
		let missing = locator.first(&email_cascade()).await.unwrap_err();
		assert_eq!(missing.tried, vec!["type=email", "any text input"]);

		match locator.require(&email_cascade()).await.unwrap_err() {
			QuillError::ElementNotFound { diagnostics, .. } => assert_eq!(diagnostics.url, "https://example.test/"),
			other => panic!("unexpected {other:?}"),
		}
	}

	#[tokio::test]
	async fn probe_gives_up_within_probe_budget() {
		let (_site, page) = page_with(Vec::new()).await;
		let clock = ManualClock::default();
		let start = clock.now();
		let timeouts = Timeouts::default();
		assert!(Locator::new(page.as_ref(), &clock, &timeouts).probe(&email_cascade()).await.is_none());
		assert!(crate::clock::age(clock.now(), start) < timeouts.element);
	}
}
