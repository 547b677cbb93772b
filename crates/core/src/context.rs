//! Collaborators shared by the flows, and the bookkeeping they all repeat.

use std::sync::Arc;

use quill_protocol::{AuthTokens, SessionStatus};
use tracing::{debug, warn};

use crate::browser::{BrowserLauncher, BrowserPage};
use crate::clock::Clock;
use crate::config::AutomationConfig;
use crate::credential::CredentialIssuer;
use crate::error::{QuillError, Result};
use crate::extract;
use crate::locator::Locator;
use crate::registry::{LiveSession, SessionRegistry};
use crate::store::SessionStore;

pub(crate) struct Context {
	pub config: AutomationConfig,
	pub store: Arc<SessionStore>,
	pub registry: Arc<SessionRegistry>,
	pub launcher: Arc<dyn BrowserLauncher>,
	pub clock: Arc<dyn Clock>,
	pub credentials: CredentialIssuer,
}

impl Context {
	pub fn locator<'a>(&'a self, page: &'a dyn BrowserPage) -> Locator<'a> {
		Locator::new(page, self.clock.as_ref(), &self.config.timeouts)
	}

	pub fn live(&self, id: &str) -> Result<LiveSession> {
		self.registry.get(id).ok_or_else(|| QuillError::SessionNotFound(id.to_string()))
	}

	/// Writes the complete record of a live session, keeping its last-active stamp.
	pub fn persist(&self, id: &str, session: &LiveSession) -> Result<()> {
		let last_active_at = self.store.get(id).map(|s| s.last_active_at).unwrap_or_else(|| self.clock.now());
		self.store.save(id, &session.snapshot(id, last_active_at))
	}

	pub fn touch(&self, id: &str) {
		if let Err(err) = self.store.update_last_active(id, self.clock.now()) {
			warn!(target = "quill.store", session = id, error = %err, "could not update last-active time");
		}
	}

	/// Registers a live session; a superseded browser is closed.
	pub async fn register(&self, id: &str, session: LiveSession) {
		if let Some(previous) = self.registry.set(id, session) {
			warn!(target = "quill.session", session = id, "superseding existing browser");
			if let Err(err) = previous.handle.close().await {
				warn!(target = "quill.session", session = id, error = %err, "superseded browser did not close cleanly");
			}
		}
	}

	/// Re-extracts the credential bundle from the live browser and persists it.
	pub async fn refresh_tokens(&self, id: &str) -> Option<AuthTokens> {
		let live = self.registry.get(id)?;
		let tokens = extract::auth_tokens(live.handle.as_ref(), &self.config.provider, self.clock.now()).await?;
		let updated = self.registry.update(id, |s| {
			s.user_data.get_or_insert_with(Default::default).auth_tokens = Some(tokens.clone());
		})?;
		if let Err(err) = self.persist(id, &updated) {
			warn!(target = "quill.session", session = id, error = %err, "could not persist refreshed tokens");
		}
		debug!(target = "quill.session", session = id, cookies = tokens.cookies.len(), "credential bundle refreshed");
		Some(tokens)
	}

	/// Closes and unregisters the browser of `id`, saving fresh tokens first
	/// when the session is logged in. The persisted record is left as is.
	pub async fn retire(&self, id: &str) -> Option<LiveSession> {
		let live = self.registry.get(id)?;
		if live.status == SessionStatus::LoggedIn {
			self.refresh_tokens(id).await;
		}
		let live = self.registry.delete(id)?;
		if let Err(err) = live.handle.close().await {
			warn!(target = "quill.session", session = id, error = %err, "browser did not close cleanly");
		}
		Some(live)
	}
}
