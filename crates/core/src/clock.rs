//! Time source for timestamps, deadlines and poll sleeps.
//!
//! Every wait in the automation flows goes through [`Clock`], so tests can swap
//! in [`ManualClock`] and fast-forward instead of sleeping wall-clock minutes.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

#[async_trait]
pub trait Clock: Send + Sync {
	fn now(&self) -> DateTime<Utc>;

	async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by tokio timers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}

	async fn sleep(&self, duration: Duration) {
		tokio::time::sleep(duration).await;
	}
}

/// A point in time after which a bounded wait gives up.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
	at: DateTime<Utc>,
}

impl Deadline {
	/// Saturates at the latest representable instant.
	pub fn after(clock: &dyn Clock, duration: Duration) -> Self {
		let now = clock.now();
		Self {
			at: now.checked_add_signed(delta(duration)).unwrap_or(DateTime::<Utc>::MAX_UTC),
		}
	}

	pub fn expired(&self, clock: &dyn Clock) -> bool {
		clock.now() >= self.at
	}
}

/// Converts a std duration, saturating instead of overflowing.
pub fn delta(duration: Duration) -> TimeDelta {
	TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

/// Non-negative age of `since` at `now`.
pub fn age(now: DateTime<Utc>, since: DateTime<Utc>) -> Duration {
	(now - since).to_std().unwrap_or_default()
}

#[cfg(any(test, feature = "test-utils"))]
pub use manual::ManualClock;

#[cfg(any(test, feature = "test-utils"))]
mod manual {
	use std::time::Duration;

	use async_trait::async_trait;
	use chrono::{DateTime, Utc};
	use parking_lot::Mutex;

	use super::{Clock, delta};

	/// Clock that only moves when slept on or advanced explicitly.
	#[derive(Debug)]
	pub struct ManualClock {
		now: Mutex<DateTime<Utc>>,
	}

	impl ManualClock {
		pub fn new(start: DateTime<Utc>) -> Self {
			Self { now: Mutex::new(start) }
		}

		pub fn advance(&self, duration: Duration) {
			*self.now.lock() += delta(duration);
		}
	}

	impl Default for ManualClock {
		fn default() -> Self {
			Self::new(Utc::now())
		}
	}

	#[async_trait]
	impl Clock for ManualClock {
		fn now(&self) -> DateTime<Utc> {
			*self.now.lock()
		}

		async fn sleep(&self, duration: Duration) {
			self.advance(duration);
			tokio::task::yield_now().await;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn manual_sleep_moves_deadline() {
		let clock = ManualClock::default();
		let deadline = Deadline::after(&clock, Duration::from_secs(300));
		assert!(!deadline.expired(&clock));
		clock.sleep(Duration::from_secs(299)).await;
		assert!(!deadline.expired(&clock));
		clock.sleep(Duration::from_secs(1)).await;
		assert!(deadline.expired(&clock));
	}

	#[test]
	fn huge_deadline_saturates() {
		let clock = ManualClock::default();
		let deadline = Deadline::after(&clock, Duration::MAX);
		clock.advance(Duration::from_secs(10 * 365 * 86_400));
		assert!(!deadline.expired(&clock));
	}

	#[test]
	fn age_never_negative() {
		let now = Utc::now();
		assert_eq!(age(now, now + TimeDelta::seconds(5)), Duration::ZERO);
		assert_eq!(age(now, now - TimeDelta::seconds(5)), Duration::from_secs(5));
	}
}
