//! Page-level browser driving.
//!
//! Flows talk to [`BrowserPage`] only. [`cdp::CdpPage`] drives a real headless
//! Chromium; `testing::FakePage` scripts a site in memory.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quill_protocol::Cookie;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod cdp;
mod script;

pub use cdp::{CdpPage, ChromeLauncher};

/// How a single probe picks an element. Only visible elements are considered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
	/// First element matching a selector list.
	Css { css: String },
	/// First element matching `tags` whose text contains any needle (case-insensitive).
	Text { tags: Vec<String>, needles: Vec<String> },
	/// First element matching `css` whose attributes mention any hint.
	Hinted { css: String, hints: Vec<String> },
	/// Last element matching a selector list.
	Last { css: String },
}

impl Strategy {
	pub fn css(css: impl Into<String>) -> Self {
		Strategy::Css { css: css.into() }
	}

	pub fn text(tags: &[&str], needles: &[&str]) -> Self {
		Strategy::Text {
			tags: tags.iter().map(|t| t.to_string()).collect(),
			needles: needles.iter().map(|n| n.to_lowercase()).collect(),
		}
	}

	pub fn hinted(css: impl Into<String>, hints: &[&str]) -> Self {
		Strategy::Hinted {
			css: css.into(),
			hints: hints.iter().map(|h| h.to_lowercase()).collect(),
		}
	}

	pub fn last(css: impl Into<String>) -> Self {
		Strategy::Last { css: css.into() }
	}
}

/// A located element. `reference` is a selector unique to this element on the
/// page it was found on; it goes stale on navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementHandle {
	pub reference: String,
	pub tag: String,
	#[serde(default)]
	pub text: String,
	#[serde(default)]
	pub attributes: BTreeMap<String, String>,
	#[serde(default)]
	pub content_editable: bool,
}

impl ElementHandle {
	pub fn attr(&self, name: &str) -> Option<&str> {
		self.attributes.get(name).map(String::as_str)
	}

	/// Short human label for logs and click records.
	pub fn label(&self) -> String {
		if !self.text.is_empty() {
			return self.text.clone();
		}
		["data-testid", "name", "aria-label", "placeholder", "id"]
			.iter()
			.find_map(|a| self.attr(a))
			.map(str::to_string)
			.unwrap_or_else(|| self.tag.clone())
	}
}

/// Snapshot of what the page looked like when a lookup failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDiagnostics {
	pub url: String,
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub html_length: usize,
	#[serde(default)]
	pub inputs: Vec<InputSummary>,
}

/// Attributes of one input-like element on a diagnosed page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSummary {
	pub tag: String,
	#[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
	pub input_type: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub placeholder: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub aria_label: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub test_id: Option<String>,
	#[serde(default)]
	pub content_editable: bool,
}

/// One browser tab driven by the automation flows.
#[async_trait]
pub trait BrowserPage: Send + Sync {
	async fn goto(&self, url: &str, timeout: Duration) -> Result<()>;

	async fn url(&self) -> Result<String>;

	async fn title(&self) -> Result<String>;

	async fn reload(&self, timeout: Duration) -> Result<()>;

	/// Single probe; `None` when nothing visible matches right now.
	async fn find(&self, strategy: &Strategy) -> Result<Option<ElementHandle>>;

	/// Empties an input's value, or a contenteditable's DOM.
	async fn clear(&self, element: &ElementHandle) -> Result<()>;

	/// Focuses the element and inserts `text`; newlines become Enter presses.
	async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<()>;

	async fn press_enter(&self, element: &ElementHandle) -> Result<()>;

	/// Pointer click at the element's center; fails with `ClickIntercepted`
	/// when another element covers that point.
	async fn click(&self, element: &ElementHandle) -> Result<()>;

	async fn scroll_into_view(&self, element: &ElementHandle) -> Result<()>;

	/// `element.click()` dispatched from script.
	async fn dom_click(&self, element: &ElementHandle) -> Result<()>;

	async fn cookies(&self) -> Result<Vec<Cookie>>;

	/// Returns whether the browser accepted the cookie.
	async fn set_cookie(&self, cookie: &Cookie) -> Result<bool>;

	async fn local_storage(&self) -> Result<BTreeMap<String, String>>;

	async fn set_local_storage(&self, entries: &BTreeMap<String, String>) -> Result<()>;

	async fn html(&self) -> Result<String>;

	/// Absolute `href` of every anchor on the page.
	async fn links(&self) -> Result<Vec<String>>;

	/// Accepts an open JavaScript dialog; `false` when none is open.
	async fn accept_dialog(&self) -> Result<bool>;

	async fn diagnostics(&self) -> Result<PageDiagnostics>;

	/// Closes the tab and shuts the browser down.
	async fn close(&self) -> Result<()>;
}

/// Starts a fresh, unauthenticated browser.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
	async fn launch(&self) -> Result<Arc<dyn BrowserPage>>;
}
