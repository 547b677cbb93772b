//! Automation settings. Built by the server from CLI flags and environment.

use std::time::Duration;

use quill_runtime::LaunchOptions;

use crate::provider::Provider;

const HOUR: Duration = Duration::from_secs(3600);
const DAY: Duration = Duration::from_secs(24 * 3600);

#[derive(Debug, Clone)]
pub struct AutomationConfig {
	pub provider: Provider,
	pub timeouts: Timeouts,
	/// Credential bundles older than this are re-extracted before publishing.
	pub freshness_window: Duration,
	pub cleanup: CleanupPolicy,
	pub credential: CredentialConfig,
	pub launch: LaunchOptions,
}

impl Default for AutomationConfig {
	fn default() -> Self {
		Self {
			provider: Provider::default(),
			timeouts: Timeouts::default(),
			freshness_window: HOUR,
			cleanup: CleanupPolicy::default(),
			credential: CredentialConfig::default(),
			launch: LaunchOptions::default(),
		}
	}
}

/// Bounds on every browser wait.
#[derive(Debug, Clone)]
pub struct Timeouts {
	pub navigation: Duration,
	/// Budget of a specific selector step.
	pub element: Duration,
	/// Budget of a generic fallback step.
	pub fallback: Duration,
	/// Budget of optional probes (verification input, subtitle, interstitials).
	pub probe: Duration,
	/// Pause after submitting a form before reading the URL.
	pub settle: Duration,
	/// How long to wait for the sign-in page to redirect after a code.
	pub redirect: Duration,
	pub poll_interval: Duration,
	pub email_poll_interval: Duration,
	pub email_verification: Duration,
	/// Longest email-verification wait a caller may ask for.
	pub email_verification_max: Duration,
	/// Per-command CDP timeout.
	pub command: Duration,
}

impl Default for Timeouts {
	fn default() -> Self {
		Self {
			navigation: Duration::from_secs(30),
			element: Duration::from_secs(10),
			fallback: Duration::from_secs(3),
			probe: Duration::from_secs(3),
			settle: Duration::from_secs(3),
			redirect: Duration::from_secs(30),
			poll_interval: Duration::from_millis(250),
			email_poll_interval: Duration::from_secs(2),
			email_verification: Duration::from_secs(300),
			email_verification_max: Duration::from_secs(1800),
			command: Duration::from_secs(30),
		}
	}
}

/// Age thresholds of the periodic sweep.
#[derive(Debug, Clone)]
pub struct CleanupPolicy {
	pub interval: Duration,
	/// Live browsers older than this are closed.
	pub active_max_age: Duration,
	/// Persisted records older than this are deleted.
	pub persistent_max_age: Duration,
}

impl Default for CleanupPolicy {
	fn default() -> Self {
		Self {
			interval: HOUR,
			active_max_age: 7 * DAY,
			persistent_max_age: 90 * DAY,
		}
	}
}

#[derive(Clone)]
pub struct CredentialConfig {
	/// HS256 signing secret.
	pub secret: String,
	pub ttl: Duration,
}

impl Default for CredentialConfig {
	fn default() -> Self {
		Self {
			secret: "quill-development-secret".into(),
			ttl: DAY,
		}
	}
}

impl std::fmt::Debug for CredentialConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CredentialConfig")
			.field("secret", &"<redacted>")
			.field("ttl", &self.ttl)
			.finish()
	}
}
