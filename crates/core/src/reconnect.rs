//! Bringing a persisted session back to a live browser.
//!
//! Sessions that never finished logging in are recreated: a blank browser under
//! the same id, status back to `created`. Logged-in sessions are reconnected:
//! the saved cookies and local storage are replayed into a fresh browser and an
//! authenticated-only page is opened to see whether they still work.

use quill_protocol::{Cookie, RestoreOutcome, SessionSnapshot, SessionStatus};
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::error::{QuillError, Result};
use crate::registry::LiveSession;

const DAY_SECS: f64 = 24.0 * 3600.0;
const EXTENSION_SECS: f64 = 30.0 * DAY_SECS;

/// Reconnects or recreates depending on the persisted status.
pub(crate) async fn restore(ctx: &Context, id: &str) -> Result<RestoreOutcome> {
	if ctx.registry.has(id) {
		return Ok(already_live());
	}
	let snapshot = ctx.store.get(id).ok_or_else(|| QuillError::SessionNotFound(id.to_string()))?;
	if snapshot.status == SessionStatus::LoggedIn {
		reconnect(ctx, id, snapshot).await
	} else {
		recreate(ctx, id, snapshot).await
	}
}

fn already_live() -> RestoreOutcome {
	RestoreOutcome {
		success: true,
		reconnected: false,
		recreated: false,
		verified: None,
	}
}

async fn recreate(ctx: &Context, id: &str, snapshot: SessionSnapshot) -> Result<RestoreOutcome> {
	info!(target = "quill.session", session = id, previous = %snapshot.status, "recreating browser");
	let handle = ctx.launcher.launch().await?;
	let mut live = LiveSession::new(handle, snapshot.created_at);
	live.email = snapshot.email;
	live.user_data = snapshot.user_data;
	ctx.persist(id, &live)?;
	ctx.register(id, live).await;
	ctx.touch(id);
	Ok(RestoreOutcome {
		success: true,
		reconnected: false,
		recreated: true,
		verified: None,
	})
}

async fn reconnect(ctx: &Context, id: &str, snapshot: SessionSnapshot) -> Result<RestoreOutcome> {
	info!(target = "quill.session", session = id, "reconnecting with saved credentials");
	let handle = ctx.launcher.launch().await?;
	let page = handle.as_ref();
	let provider = &ctx.config.provider;
	let timeouts = &ctx.config.timeouts;

	if let Err(err) = page.goto(&provider.root_url(), timeouts.navigation).await {
		warn!(target = "quill.session", session = id, error = %err, "could not open provider root before restoring cookies");
	}

	let tokens = snapshot.user_data.as_ref().and_then(|u| u.auth_tokens.as_ref());
	if let Some(tokens) = tokens {
		let now_secs = ctx.clock.now().timestamp() as f64;
		let mut restored = 0;
		for cookie in &tokens.cookies {
			if restore_cookie(page, &extend_expiry(cookie, now_secs), &provider.domain).await {
				restored += 1;
			} else {
				debug!(target = "quill.session", session = id, cookie = %cookie.name, "cookie not accepted under any domain");
			}
		}
		if !tokens.local_storage.is_empty() {
			if let Err(err) = page.set_local_storage(&tokens.local_storage).await {
				warn!(target = "quill.session", session = id, error = %err, "could not restore local storage");
			}
		}
		info!(
			target = "quill.session",
			session = id,
			restored,
			total = tokens.cookies.len(),
			storage = tokens.local_storage.len(),
			"credential bundle restored"
		);
	} else {
		warn!(target = "quill.session", session = id, "logged-in session has no saved credentials");
	}

	if let Err(err) = page.reload(timeouts.navigation).await {
		debug!(target = "quill.session", session = id, error = %err, "reload after restore failed");
	}

	let verified = match page.goto(&provider.auth_check_url(), timeouts.navigation).await {
		Ok(()) => page.url().await.map(|url| !provider.is_sign_in(&url)).unwrap_or(false),
		Err(err) => {
			warn!(target = "quill.session", session = id, error = %err, "auth check navigation failed");
			false
		}
	};
	if !verified {
		warn!(target = "quill.session", session = id, "restored credentials did not authenticate; login required");
	}

	let mut live = LiveSession::new(handle, snapshot.created_at);
	live.status = SessionStatus::LoggedIn;
	live.email = snapshot.email;
	live.user_data = snapshot.user_data;
	ctx.register(id, live).await;
	ctx.touch(id);

	Ok(RestoreOutcome {
		success: true,
		reconnected: true,
		recreated: false,
		verified: Some(verified),
	})
}

/// Pushes cookies that would lapse within a day out by thirty days.
pub fn extend_expiry(cookie: &Cookie, now_secs: f64) -> Cookie {
	let mut cookie = cookie.clone();
	let lapses_soon = !cookie.is_session() && cookie.expires.is_some_and(|e| e - now_secs < DAY_SECS);
	if lapses_soon {
		cookie.expires = Some(now_secs + EXTENSION_SECS);
	}
	cookie
}

/// Domains to try for one cookie: as stored, with and without the leading dot,
/// then the provider apex both ways.
pub fn domain_variants(stored: Option<&str>, apex: &str) -> Vec<String> {
	let mut variants = Vec::new();
	let mut push = |d: String| {
		if !d.is_empty() && d != "." && !variants.contains(&d) {
			variants.push(d);
		}
	};
	if let Some(stored) = stored {
		push(stored.to_string());
		let bare = stored.trim_start_matches('.');
		push(bare.to_string());
		push(format!(".{bare}"));
	}
	push(format!(".{apex}"));
	push(apex.to_string());
	variants
}

async fn restore_cookie(page: &dyn crate::browser::BrowserPage, cookie: &Cookie, apex: &str) -> bool {
	for domain in domain_variants(cookie.domain.as_deref(), apex) {
		let mut attempt = cookie.clone();
		attempt.domain = Some(domain);
		match page.set_cookie(&attempt).await {
			Ok(true) => return true,
			Ok(false) => {}
			Err(err) => debug!(target = "quill.session", cookie = %cookie.name, error = %err, "set_cookie failed"),
		}
	}
	false
}
