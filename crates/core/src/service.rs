//! The session lifecycle API.
//!
//! Every operation on a session id holds that id's lock for its whole duration,
//! so one browser is never driven by two calls at once. Registry and store locks
//! are only taken for map access, never across browser calls.

use std::sync::Arc;
use std::time::Duration;

use quill_protocol::{
	LoginStarted, PostRequest, PublishResult, RestoreOutcome, SessionCreated, SessionListing, SessionStatus,
	SessionStatusReport, SessionSummary, VerificationResult,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::browser::BrowserLauncher;
use crate::cleanup::{self, CleanupReport};
use crate::clock::{Clock, SystemClock};
use crate::config::AutomationConfig;
use crate::context::Context;
use crate::credential::CredentialIssuer;
use crate::error::{QuillError, Result};
use crate::registry::{LiveSession, SessionLocks, SessionRegistry};
use crate::store::SessionStore;
use crate::{login, publish, reconnect};

pub struct AutomationService {
	ctx: Context,
	locks: SessionLocks,
}

impl AutomationService {
	pub fn new(config: AutomationConfig, store: Arc<SessionStore>, launcher: Arc<dyn BrowserLauncher>) -> Self {
		Self::with_clock(config, store, launcher, Arc::new(SystemClock))
	}

	pub fn with_clock(
		config: AutomationConfig,
		store: Arc<SessionStore>,
		launcher: Arc<dyn BrowserLauncher>,
		clock: Arc<dyn Clock>,
	) -> Self {
		let credentials = CredentialIssuer::new(config.provider.name.clone(), &config.credential);
		Self {
			ctx: Context {
				config,
				store,
				registry: Arc::new(SessionRegistry::new()),
				launcher,
				clock,
				credentials,
			},
			locks: SessionLocks::new(),
		}
	}

	pub fn config(&self) -> &AutomationConfig {
		&self.ctx.config
	}

	pub fn registry(&self) -> &SessionRegistry {
		&self.ctx.registry
	}

	pub fn store(&self) -> &SessionStore {
		&self.ctx.store
	}

	pub fn credentials(&self) -> &CredentialIssuer {
		&self.ctx.credentials
	}

	/// Launches a browser under a new session id.
	pub async fn create_session(&self) -> Result<SessionCreated> {
		let id = Uuid::new_v4().to_string();
		let _guard = self.locks.acquire(&id).await;
		let handle = self.ctx.launcher.launch().await?;
		let live = LiveSession::new(handle, self.ctx.clock.now());
		self.ctx.persist(&id, &live)?;
		self.ctx.register(&id, live).await;
		info!(target = "quill.session", session = %id, "session created");
		Ok(SessionCreated { session_id: id })
	}

	pub async fn initiate_login(&self, id: &str, email: &str) -> Result<LoginStarted> {
		let _guard = self.locks.acquire(id).await;
		self.ensure_live(id).await?;
		login::initiate(&self.ctx, id, email).await
	}

	pub async fn submit_verification_code(&self, id: &str, code: &str) -> Result<VerificationResult> {
		let _guard = self.locks.acquire(id).await;
		self.require_verification_page(id, "submit verification code")?;
		login::submit_code(&self.ctx, id, code).await
	}

	/// `timeout` defaults to the configured email-verification wait and may not
	/// exceed `email_verification_max`.
	pub async fn wait_for_email_verification(&self, id: &str, timeout: Option<Duration>) -> Result<VerificationResult> {
		let limit = self.ctx.config.timeouts.email_verification_max;
		if timeout.is_some_and(|t| t > limit) {
			return Err(QuillError::InvalidInput(format!(
				"verification wait may be at most {}ms",
				limit.as_millis()
			)));
		}
		let _guard = self.locks.acquire(id).await;
		self.require_verification_page(id, "wait for email verification")?;
		let timeout = timeout.unwrap_or(self.ctx.config.timeouts.email_verification);
		login::wait_for_email(&self.ctx, id, timeout).await
	}

	/// Reads live and persisted state without touching the browser.
	pub fn session_status(&self, id: &str) -> SessionStatusReport {
		let live = self.ctx.registry.get(id);
		let persisted = self.ctx.store.get(id);
		let status = live
			.as_ref()
			.map(|l| l.status)
			.or_else(|| persisted.as_ref().map(|p| p.status))
			.unwrap_or(SessionStatus::NotFound);
		SessionStatusReport {
			exists: live.is_some() || persisted.is_some(),
			status,
			is_active: live.is_some(),
			is_persistent: persisted.is_some(),
			needs_reconnection: live.is_none() && persisted.is_some_and(|p| p.status == SessionStatus::LoggedIn),
		}
	}

	pub fn list_sessions(&self) -> SessionListing {
		let active = self
			.ctx
			.registry
			.snapshot()
			.into_iter()
			.map(|(id, live)| SessionSummary::from(&live.snapshot(&id, live.created_at)))
			.collect();
		let persistent = self.ctx.store.get_all().values().map(SessionSummary::from).collect();
		SessionListing { active, persistent }
	}

	/// Reconnects a logged-in session or recreates any other one. A no-op when
	/// the session already has a live browser.
	pub async fn reconnect_session(&self, id: &str) -> Result<RestoreOutcome> {
		let _guard = self.locks.acquire(id).await;
		reconnect::restore(&self.ctx, id).await
	}

	/// Re-extracts the credential bundle from the live browser.
	pub async fn refresh_session_auth(&self, id: &str) -> Result<bool> {
		let _guard = self.locks.acquire(id).await;
		self.ensure_live(id).await?;
		self.require_status(id, SessionStatus::LoggedIn, "refresh session auth")?;
		let refreshed = self.ctx.refresh_tokens(id).await.is_some();
		if refreshed {
			self.ctx.touch(id);
		}
		Ok(refreshed)
	}

	/// Closes the browser; the persisted record is kept for later reconnection.
	pub async fn close_session(&self, id: &str) -> Result<bool> {
		let guard = self.locks.acquire(id).await;
		let closed = self.ctx.retire(id).await.is_some();
		drop(guard);
		if closed {
			self.locks.forget(id);
			info!(target = "quill.session", session = id, "session closed");
		}
		Ok(closed)
	}

	pub async fn create_post(&self, id: &str, post: &PostRequest) -> Result<PublishResult> {
		publish::validate(post)?;
		let _guard = self.locks.acquire(id).await;
		self.ensure_live(id).await?;
		publish::publish(&self.ctx, id, post).await
	}

	/// Closes browsers older than `active_max_age` and drops records older than
	/// `persistent_max_age`.
	pub async fn cleanup_expired(&self, active_max_age: Duration, persistent_max_age: Duration) -> CleanupReport {
		cleanup::sweep(&self.ctx, &self.locks, active_max_age, persistent_max_age).await
	}

	/// Saves fresh tokens and closes every live browser.
	pub async fn shutdown(&self) {
		let ids = self.ctx.registry.ids();
		if !ids.is_empty() {
			info!(target = "quill.session", count = ids.len(), "closing live sessions");
		}
		for id in ids {
			let _guard = self.locks.acquire(&id).await;
			if self.ctx.retire(&id).await.is_none() {
				warn!(target = "quill.session", session = %id, "session vanished during shutdown");
			}
		}
	}

	/// Makes sure `id` has a live browser, restoring it from the store if needed.
	async fn ensure_live(&self, id: &str) -> Result<()> {
		if self.ctx.registry.has(id) {
			return Ok(());
		}
		let outcome = reconnect::restore(&self.ctx, id).await?;
		if outcome.verified == Some(false) {
			warn!(target = "quill.session", session = id, "continuing with unverified restored session");
		}
		Ok(())
	}

	/// Verification needs the browser that submitted the email; a restored
	/// browser would start from a blank page.
	fn require_verification_page(&self, id: &str, operation: &'static str) -> Result<()> {
		self.require_status(id, SessionStatus::AwaitingVerification, operation)?;
		if !self.ctx.registry.has(id) {
			return Err(QuillError::invalid_state(
				id,
				operation,
				"the browser showing the verification page is gone; initiate login again",
			));
		}
		Ok(())
	}

	/// Status check against the live record, else the persisted one.
	fn require_status(&self, id: &str, expected: SessionStatus, operation: &'static str) -> Result<()> {
		let actual = match self.ctx.registry.get(id) {
			Some(live) => live.status,
			None => self.ctx.store.get(id).ok_or_else(|| QuillError::SessionNotFound(id.to_string()))?.status,
		};
		if actual == expected {
			return Ok(());
		}
		Err(QuillError::invalid_state(id, operation, format!("status is {actual}, expected {expected}")))
	}
}
