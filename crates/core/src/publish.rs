//! Post publishing through the publication's editor.
//!
//! Unlike login scraping, every step here is mandatory: a missing editor or
//! publish control aborts the call with page diagnostics, because half a post
//! has no safe meaning. Only the subtitle and the subscribe-buttons prompt are
//! optional.

use quill_protocol::{PostRequest, PublishResult, SessionStatus};
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::{BrowserPage, ElementHandle};
use crate::clock::age;
use crate::context::Context;
use crate::error::{QuillError, Result};
use crate::extract;
use crate::locator::Located;
use crate::provider::is_user_subdomain;
use crate::registry::LiveSession;
use crate::selectors;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_CONTENT_CHARS: usize = 100_000;

/// Rejects posts before any browser work. Lengths count characters, not bytes.
pub fn validate(post: &PostRequest) -> Result<()> {
	let title = post.title.trim();
	if title.is_empty() {
		return Err(QuillError::InvalidInput("title is required".into()));
	}
	let title_chars = post.title.chars().count();
	if title_chars > MAX_TITLE_CHARS {
		return Err(QuillError::InvalidInput(format!(
			"title is {title_chars} characters; the limit is {MAX_TITLE_CHARS}"
		)));
	}
	if post.content.trim().is_empty() {
		return Err(QuillError::InvalidInput("content is required".into()));
	}
	let content_chars = post.content.chars().count();
	if content_chars > MAX_CONTENT_CHARS {
		return Err(QuillError::InvalidInput(format!(
			"content is {content_chars} characters; the limit is {MAX_CONTENT_CHARS}"
		)));
	}
	if let Some(sub) = &post.subdomain {
		normalize_subdomain(sub)?;
	}
	Ok(())
}

/// Accepts `name` or `name.substack.com`.
fn normalize_subdomain(raw: &str) -> Result<String> {
	let lowered = raw.trim().to_ascii_lowercase();
	let sub = lowered.strip_suffix(".substack.com").unwrap_or(&lowered);
	if is_user_subdomain(sub) {
		Ok(sub.to_string())
	} else {
		Err(QuillError::InvalidInput(format!("not a publication subdomain: {raw:?}")))
	}
}

pub(crate) async fn publish(ctx: &Context, id: &str, post: &PostRequest) -> Result<PublishResult> {
	let live = ctx.live(id)?;
	if live.status != SessionStatus::LoggedIn {
		return Err(QuillError::invalid_state(
			id,
			"create post",
			format!("status is {}, expected {}", live.status, SessionStatus::LoggedIn),
		));
	}
	refresh_if_stale(ctx, id, &live).await;

	let page = live.handle.as_ref();
	let subdomain = resolve_subdomain(ctx, id, &live, post.subdomain.as_deref()).await?;
	info!(target = "quill.publish", session = id, %subdomain, draft = post.is_draft, "publishing");

	open_editor(ctx, page, &subdomain).await?;

	let title = ctx.locator(page).require(&selectors::title_field()).await?;
	fill(page, &title.element, &post.title).await?;

	if let Some(subtitle) = post.subtitle.as_deref().filter(|s| !s.trim().is_empty()) {
		match ctx.locator(page).probe(&selectors::subtitle_field()).await {
			Some(field) => {
				if let Err(err) = fill(page, &field.element, subtitle).await {
					warn!(target = "quill.publish", session = id, error = %err, "could not fill subtitle");
				}
			}
			None => warn!(target = "quill.publish", session = id, "subtitle field not found; continuing without it"),
		}
	}

	let editor = ctx.locator(page).require(&selectors::content_editor()).await?;
	fill(page, &editor.element, &post.content).await?;

	let next = ctx.locator(page).require(&selectors::continue_button()).await?;
	click_robust(page, &next).await?;

	let terminal = ctx.locator(page).require(&selectors::terminal_action(post.is_draft)).await?;
	click_robust(page, &terminal).await?;

	if !post.is_draft {
		if let Some(prompt) = ctx.locator(page).probe(&selectors::subscribe_interstitial()).await {
			debug!(target = "quill.publish", session = id, "dismissing subscribe-buttons prompt");
			click_robust(page, &prompt).await?;
		}
	}

	ctx.clock.sleep(ctx.config.timeouts.settle).await;
	let current_url = page.url().await?;
	let post_url = post_url_from(&current_url);
	ctx.touch(id);
	info!(target = "quill.publish", session = id, post_url = ?post_url, draft = post.is_draft, "post submitted");

	Ok(PublishResult {
		success: true,
		post_url,
		current_url,
		created_at: ctx.clock.now(),
		is_draft: post.is_draft,
	})
}

/// Re-extracts the credential bundle when it is older than the freshness window.
async fn refresh_if_stale(ctx: &Context, id: &str, live: &LiveSession) {
	let extracted_at = live.user_data.as_ref().and_then(|u| u.auth_tokens.as_ref()).map(|t| t.extracted_at);
	let stale = extracted_at.is_none_or(|at| age(ctx.clock.now(), at) > ctx.config.freshness_window);
	if stale {
		debug!(target = "quill.publish", session = id, "credential bundle stale; re-extracting");
		if ctx.refresh_tokens(id).await.is_none() {
			warn!(target = "quill.publish", session = id, "could not refresh credential bundle; publishing anyway");
		}
	}
}

async fn resolve_subdomain(ctx: &Context, id: &str, live: &LiveSession, requested: Option<&str>) -> Result<String> {
	if let Some(requested) = requested {
		return normalize_subdomain(requested);
	}
	if let Some(cached) = live.user_data.as_ref().and_then(|u| u.subdomain.clone()) {
		return Ok(cached);
	}

	let page = live.handle.as_ref();
	let provider = &ctx.config.provider;
	let mut saw_prompt = false;
	for path in &provider.discovery_paths {
		let url = provider.url(path);
		if let Err(err) = page.goto(&url, ctx.config.timeouts.navigation).await {
			debug!(target = "quill.publish", session = id, %url, error = %err, "discovery page unavailable");
			continue;
		}
		let html = page.html().await.unwrap_or_default();
		let links = page.links().await.unwrap_or_default();
		if let Some(found) = extract::subdomain(&html, &links, provider) {
			info!(target = "quill.publish", session = id, subdomain = %found, "publication discovered");
			let updated = ctx.registry.update(id, |s| {
				s.user_data.get_or_insert_with(Default::default).subdomain = Some(found.clone());
			});
			if let Some(updated) = updated {
				ctx.persist(id, &updated)?;
			}
			return Ok(found);
		}
		let lowered = html.to_lowercase();
		saw_prompt |= selectors::NO_PUBLICATION_PROMPTS.iter().any(|p| lowered.contains(p));
	}

	if saw_prompt {
		return Err(QuillError::NoPublication(
			"this account has not created a publication yet; create one on Substack first".into(),
		));
	}
	let diagnostics = page.diagnostics().await.unwrap_or_default();
	Err(QuillError::ElementNotFound {
		target: "publication subdomain".into(),
		tried: provider.discovery_paths.clone(),
		diagnostics: Box::new(diagnostics),
	})
}

/// Lands on an empty post editor for `subdomain`.
async fn open_editor(ctx: &Context, page: &dyn BrowserPage, subdomain: &str) -> Result<()> {
	let provider = &ctx.config.provider;
	let navigation = ctx.config.timeouts.navigation;

	page.goto(&provider.publication_url(subdomain, "/publish/post"), navigation).await?;
	dismiss_dialog(ctx, page).await;
	if ctx.locator(page).probe(&selectors::title_field()).await.is_some() {
		return Ok(());
	}

	debug!(target = "quill.publish", %subdomain, "editor not exposed directly; going through the dashboard");
	page.goto(&provider.publication_url(subdomain, "/publish/home"), navigation).await?;
	dismiss_dialog(ctx, page).await;

	if let Some(new_post) = ctx.locator(page).probe(&selectors::new_post()).await {
		click_robust(page, &new_post).await?;
	} else {
		let menu = ctx.locator(page).require(&selectors::write_menu()).await?;
		click_robust(page, &menu).await?;
		let option = ctx.locator(page).require(&selectors::text_post_option()).await?;
		click_robust(page, &option).await?;
	}
	dismiss_dialog(ctx, page).await;
	Ok(())
}

/// Accepts a stray JavaScript dialog and reloads so the page is usable again.
async fn dismiss_dialog(ctx: &Context, page: &dyn BrowserPage) {
	match page.accept_dialog().await {
		Ok(true) => {
			warn!(target = "quill.publish", "accepted unexpected dialog; reloading");
			if let Err(err) = page.reload(ctx.config.timeouts.navigation).await {
				debug!(target = "quill.publish", error = %err, "reload after dialog failed");
			}
		}
		Ok(false) => {}
		Err(err) => debug!(target = "quill.publish", error = %err, "dialog check failed"),
	}
}

async fn fill(page: &dyn BrowserPage, element: &ElementHandle, text: &str) -> Result<()> {
	page.clear(element).await?;
	page.type_text(element, text).await
}

/// Scrolls into view and clicks, falling back to a script click when the
/// pointer click is intercepted.
async fn click_robust(page: &dyn BrowserPage, located: &Located) -> Result<()> {
	let element = &located.element;
	if let Err(err) = page.scroll_into_view(element).await {
		debug!(target = "quill.publish", control = %element.label(), error = %err, "scroll failed");
	}
	match page.click(element).await {
		Ok(()) => Ok(()),
		Err(QuillError::ClickIntercepted(label)) => {
			warn!(target = "quill.publish", control = %label, "click intercepted; using script click");
			page.dom_click(element).await
		}
		Err(err) => {
			warn!(target = "quill.publish", control = %element.label(), error = %err, "click failed; using script click");
			page.dom_click(element).await
		}
	}
}

/// Post URL when the browser ended up on the post or its edit page.
pub fn post_url_from(current: &str) -> Option<String> {
	let url = Url::parse(current).ok()?;
	let path = url.path();
	let is_post = path.starts_with("/p/")
		|| path
			.strip_prefix("/publish/post/")
			.is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()));
	is_post.then(|| format!("{}{}", url.origin().ascii_serialization(), path))
}
