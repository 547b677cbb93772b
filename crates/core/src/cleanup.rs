//! Periodic eviction of old browsers and old records.
//!
//! Browsers are the scarce resource, so live sessions are closed after the
//! active threshold while their records stay reusable until the much longer
//! persistent threshold.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::clock::age;
use crate::context::Context;
use crate::registry::SessionLocks;
use crate::service::AutomationService;

const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
	/// Live browsers closed.
	pub closed: usize,
	/// Records deleted together with their browser.
	pub evicted: usize,
	/// Records deleted by the store sweep.
	pub expired: usize,
}

pub(crate) async fn sweep(ctx: &Context, locks: &SessionLocks, active_max_age: Duration, persistent_max_age: Duration) -> CleanupReport {
	let mut report = CleanupReport::default();
	let now = ctx.clock.now();

	for (id, live) in ctx.registry.snapshot() {
		let session_age = age(now, live.created_at);
		if session_age < active_max_age {
			continue;
		}
		let guard = locks.acquire(&id).await;
		let Some(retired) = ctx.retire(&id).await else {
			continue;
		};
		report.closed += 1;

		if session_age >= persistent_max_age {
			match ctx.store.delete(&id) {
				Ok(true) => report.evicted += 1,
				Ok(false) => {}
				Err(err) => warn!(target = "quill.cleanup", session = %id, error = %err, "could not delete record"),
			}
		} else if let Err(err) = ctx.persist(&id, &retired) {
			warn!(target = "quill.cleanup", session = %id, error = %err, "could not persist retired session");
		}
		drop(guard);
		locks.forget(&id);
		debug!(target = "quill.cleanup", session = %id, age_secs = session_age.as_secs(), "browser closed");
	}

	match ctx.store.cleanup_expired(persistent_max_age, now) {
		Ok(expired) => report.expired = expired,
		Err(err) => warn!(target = "quill.cleanup", error = %err, "store sweep failed"),
	}

	if report != CleanupReport::default() {
		info!(
			target = "quill.cleanup",
			closed = report.closed,
			evicted = report.evicted,
			expired = report.expired,
			"cleanup sweep finished"
		);
	}
	report
}

/// Runs [`AutomationService::cleanup_expired`] with the configured policy on
/// every interval tick. The first tick is skipped.
pub fn spawn_scheduler(service: Arc<AutomationService>) -> JoinHandle<()> {
	let policy = service.config().cleanup.clone();
	tokio::spawn(async move {
		let mut ticker = tokio::time::interval(policy.interval.max(MIN_INTERVAL));
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
		ticker.tick().await;
		info!(
			target = "quill.cleanup",
			interval_secs = policy.interval.as_secs(),
			active_max_age_secs = policy.active_max_age.as_secs(),
			persistent_max_age_secs = policy.persistent_max_age.as_secs(),
			"cleanup scheduler started"
		);
		loop {
			ticker.tick().await;
			service.cleanup_expired(policy.active_max_age, policy.persistent_max_age).await;
		}
	})
}
