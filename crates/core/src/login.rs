//! Email + one-time-code login against the provider's sign-in page.
//!
//! ```text
//! created ── initiate ──▶ email submitted ──▶ logged_in
//!                                  │
//!                                  └──▶ awaiting_verification ── code / email link ──▶ logged_in
//!                                                                       └── deadline ──▶ verification_timeout
//! ```
//!
//! A verification timeout is reported to the caller only; the persisted status
//! stays `awaiting_verification` so a retry is safe.

use std::time::Duration;

use quill_protocol::{LoginStarted, SessionStatus, UserData, VerificationResult};
use tracing::{debug, info, warn};

use crate::browser::{BrowserPage, ElementHandle};
use crate::clock::Deadline;
use crate::context::Context;
use crate::error::{QuillError, Result};
use crate::extract;
use crate::selectors;

pub(crate) async fn initiate(ctx: &Context, id: &str, email: &str) -> Result<LoginStarted> {
	let email = email.trim();
	if email.is_empty() || !email.contains('@') {
		return Err(QuillError::InvalidInput(format!("not an email address: {email:?}")));
	}

	let live = ctx.live(id)?;
	if live.status == SessionStatus::LoggedIn {
		return Err(QuillError::invalid_state(id, "initiate login", "session is already logged in"));
	}
	if let Some(bound) = live.email.as_deref().filter(|bound| !bound.eq_ignore_ascii_case(email)) {
		return Err(QuillError::invalid_state(id, "initiate login", format!("session is bound to {bound}")));
	}

	let page = live.handle.as_ref();
	let provider = &ctx.config.provider;
	let timeouts = &ctx.config.timeouts;

	info!(target = "quill.login", session = id, "opening sign-in page");
	page.goto(&provider.sign_in_url(), timeouts.navigation).await?;
	match page.title().await {
		Ok(title) if title.to_lowercase().contains(&provider.name) => {}
		Ok(title) => warn!(target = "quill.login", session = id, %title, "unexpected sign-in page title"),
		Err(err) => debug!(target = "quill.login", session = id, error = %err, "title unavailable"),
	}

	let input = ctx.locator(page).require(&selectors::email_input()).await?;
	page.clear(&input.element).await?;
	page.type_text(&input.element, email).await?;
	submit(ctx, page, &input.element, &selectors::submit_button()).await?;
	ctx.clock.sleep(timeouts.settle).await;

	let url = page.url().await?;
	if provider.is_authenticated_page(&url) {
		info!(target = "quill.login", session = id, %url, "already authenticated after email submit");
		let (user_data, credential) = complete(ctx, id, Some(email)).await?;
		return Ok(LoginStarted {
			status: SessionStatus::LoggedIn,
			has_verification_input: false,
			user_data: Some(user_data),
			credential: Some(credential),
		});
	}

	let has_verification_input = ctx.locator(page).probe(&selectors::verification_input()).await.is_some();
	let updated = ctx
		.registry
		.update(id, |s| {
			s.status = SessionStatus::AwaitingVerification;
			s.email = Some(email.to_string());
		})
		.ok_or_else(|| QuillError::SessionNotFound(id.to_string()))?;
	ctx.persist(id, &updated)?;
	info!(target = "quill.login", session = id, has_verification_input, "awaiting verification");

	Ok(LoginStarted {
		status: SessionStatus::AwaitingVerification,
		has_verification_input,
		user_data: None,
		credential: None,
	})
}

pub(crate) async fn submit_code(ctx: &Context, id: &str, code: &str) -> Result<VerificationResult> {
	let live = ctx.live(id)?;
	require_awaiting(id, live.status, "submit verification code")?;
	let code = code.trim();
	if code.is_empty() {
		return Err(QuillError::InvalidInput("verification code is empty".into()));
	}

	let page = live.handle.as_ref();
	let input = ctx.locator(page).require(&selectors::verification_input()).await?;
	page.clear(&input.element).await?;
	page.type_text(&input.element, code).await?;
	submit(ctx, page, &input.element, &selectors::verify_button()).await?;

	let timeout = ctx.config.timeouts.redirect;
	let deadline = Deadline::after(ctx.clock.as_ref(), timeout);
	loop {
		match page.url().await {
			Ok(url) if ctx.config.provider.is_authenticated_page(&url) => break,
			Ok(_) => {}
			Err(err) => debug!(target = "quill.login", session = id, error = %err, "url poll failed"),
		}
		if deadline.expired(ctx.clock.as_ref()) {
			warn!(target = "quill.login", session = id, "sign-in page did not redirect after code");
			return Err(QuillError::VerificationTimeout {
				ms: timeout.as_millis() as u64,
			});
		}
		ctx.clock.sleep(ctx.config.timeouts.poll_interval).await;
	}

	let (user_data, credential) = complete(ctx, id, live.email.as_deref()).await?;
	Ok(VerificationResult {
		status: SessionStatus::LoggedIn,
		user_data: Some(user_data),
		credential: Some(credential),
	})
}

/// Polls for the "click the link in your email" path to land on an authenticated page.
pub(crate) async fn wait_for_email(ctx: &Context, id: &str, timeout: Duration) -> Result<VerificationResult> {
	let live = ctx.live(id)?;
	require_awaiting(id, live.status, "wait for email verification")?;

	let page = live.handle.as_ref();
	let deadline = Deadline::after(ctx.clock.as_ref(), timeout);
	info!(target = "quill.login", session = id, timeout_ms = timeout.as_millis() as u64, "waiting for email verification");
	loop {
		match page.url().await {
			Ok(url) if ctx.config.provider.is_authenticated_page(&url) => {
				let (user_data, credential) = complete(ctx, id, live.email.as_deref()).await?;
				return Ok(VerificationResult {
					status: SessionStatus::LoggedIn,
					user_data: Some(user_data),
					credential: Some(credential),
				});
			}
			Ok(_) => {}
			Err(err) => debug!(target = "quill.login", session = id, error = %err, "url poll failed; retrying"),
		}
		if deadline.expired(ctx.clock.as_ref()) {
			info!(target = "quill.login", session = id, "email verification timed out");
			return Ok(VerificationResult {
				status: SessionStatus::VerificationTimeout,
				user_data: None,
				credential: None,
			});
		}
		ctx.clock.sleep(ctx.config.timeouts.email_poll_interval).await;
	}
}

fn require_awaiting(id: &str, status: SessionStatus, operation: &'static str) -> Result<()> {
	if status == SessionStatus::AwaitingVerification {
		return Ok(());
	}
	Err(QuillError::invalid_state(
		id,
		operation,
		format!("status is {status}, expected {}", SessionStatus::AwaitingVerification),
	))
}

/// Clicks the form's submit control, or presses Enter in `field` when there is none.
async fn submit(ctx: &Context, page: &dyn BrowserPage, field: &ElementHandle, buttons: &crate::locator::Cascade) -> Result<()> {
	if let Some(button) = ctx.locator(page).probe(buttons).await {
		match page.click(&button.element).await {
			Ok(()) => return Ok(()),
			Err(err) => debug!(target = "quill.login", error = %err, "submit click failed; pressing Enter"),
		}
	}
	page.press_enter(field).await
}

/// Scrapes user data, mints the credential and records `logged_in`.
async fn complete(ctx: &Context, id: &str, email: Option<&str>) -> Result<(UserData, String)> {
	let live = ctx.live(id)?;
	let user_data = extract::user_data(
		live.handle.as_ref(),
		&ctx.config.provider,
		ctx.clock.as_ref(),
		&ctx.config.timeouts,
		email,
	)
	.await;
	let credential = ctx.credentials.mint(id, &user_data, ctx.clock.now())?;

	let updated = ctx
		.registry
		.update(id, |s| {
			s.status = SessionStatus::LoggedIn;
			if s.email.is_none() {
				s.email = email.map(str::to_string);
			}
			s.user_data = Some(user_data.clone());
		})
		.ok_or_else(|| QuillError::SessionNotFound(id.to_string()))?;
	ctx.persist(id, &updated)?;
	ctx.touch(id);
	info!(target = "quill.login", session = id, subdomain = ?user_data.subdomain, "logged in");
	Ok((user_data, credential))
}
