//! Live sessions: in-memory records that own a running browser.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use quill_protocol::{SessionSnapshot, SessionStatus, UserData};
use tokio::sync::OwnedMutexGuard;

use crate::browser::BrowserPage;

/// Volatile record of a session whose browser is running.
#[derive(Clone)]
pub struct LiveSession {
	pub handle: Arc<dyn BrowserPage>,
	pub status: SessionStatus,
	pub email: Option<String>,
	pub created_at: DateTime<Utc>,
	pub user_data: Option<UserData>,
}

impl LiveSession {
	pub fn new(handle: Arc<dyn BrowserPage>, created_at: DateTime<Utc>) -> Self {
		Self {
			handle,
			status: SessionStatus::Created,
			email: None,
			created_at,
			user_data: None,
		}
	}

	/// Complete durable record for this session.
	pub fn snapshot(&self, id: &str, last_active_at: DateTime<Utc>) -> SessionSnapshot {
		SessionSnapshot {
			id: id.to_string(),
			status: self.status,
			email: self.email.clone(),
			created_at: self.created_at,
			last_active_at,
			user_data: self.user_data.clone(),
		}
	}
}

impl fmt::Debug for LiveSession {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LiveSession")
			.field("status", &self.status)
			.field("email", &self.email)
			.field("created_at", &self.created_at)
			.finish_non_exhaustive()
	}
}

/// Session id to live record. Injected wherever live sessions are read or written.
#[derive(Debug, Default)]
pub struct SessionRegistry {
	sessions: RwLock<HashMap<String, LiveSession>>,
}

impl SessionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn has(&self, id: &str) -> bool {
		self.sessions.read().contains_key(id)
	}

	pub fn get(&self, id: &str) -> Option<LiveSession> {
		self.sessions.read().get(id).cloned()
	}

	/// Registers `session`, returning the record it superseded.
	pub fn set(&self, id: &str, session: LiveSession) -> Option<LiveSession> {
		self.sessions.write().insert(id.to_string(), session)
	}

	pub fn delete(&self, id: &str) -> Option<LiveSession> {
		self.sessions.write().remove(id)
	}

	/// Applies `change` to the live record, returning the updated copy.
	pub fn update(&self, id: &str, change: impl FnOnce(&mut LiveSession)) -> Option<LiveSession> {
		let mut sessions = self.sessions.write();
		let session = sessions.get_mut(id)?;
		change(session);
		Some(session.clone())
	}

	pub fn ids(&self) -> Vec<String> {
		let mut ids: Vec<_> = self.sessions.read().keys().cloned().collect();
		ids.sort();
		ids
	}

	pub fn snapshot(&self) -> Vec<(String, LiveSession)> {
		let mut all: Vec<_> = self.sessions.read().iter().map(|(id, s)| (id.clone(), s.clone())).collect();
		all.sort_by(|a, b| a.1.created_at.cmp(&b.1.created_at).then_with(|| a.0.cmp(&b.0)));
		all
	}

	pub fn len(&self) -> usize {
		self.sessions.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// Per-session async mutexes serializing operations on one browser.
#[derive(Debug, Default)]
pub struct SessionLocks {
	locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
	pub fn new() -> Self {
		Self::default()
	}

	/// Waits for exclusive access to `id`. Other ids are unaffected.
	pub async fn acquire(&self, id: &str) -> OwnedMutexGuard<()> {
		let lock = Arc::clone(self.locks.lock().entry(id.to_string()).or_default());
		lock.lock_owned().await
	}

	/// Drops the lock entry of a closed session. An entry that is still held or
	/// waited on stays, so later callers queue behind the same mutex.
	pub fn forget(&self, id: &str) {
		let mut locks = self.locks.lock();
		if locks.get(id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
			locks.remove(id);
		}
	}

	#[cfg(test)]
	fn tracked(&self, id: &str) -> bool {
		self.locks.lock().contains_key(id)
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;
	use crate::testing::FakeSite;

	#[test]
	fn set_returns_superseded_record() {
		let site = FakeSite::new();
		let registry = SessionRegistry::new();
		let now = Utc::now();

		assert!(registry.set("s1", LiveSession::new(site.open_page(), now)).is_none());
		let mut next = LiveSession::new(site.open_page(), now);
		next.status = SessionStatus::LoggedIn;
		let previous = registry.set("s1", next).unwrap();

		assert_eq!(previous.status, SessionStatus::Created);
		assert_eq!(registry.get("s1").unwrap().status, SessionStatus::LoggedIn);
		assert_eq!(registry.len(), 1);
	}

	#[test]
	fn update_and_delete() {
		let site = FakeSite::new();
		let registry = SessionRegistry::new();
		registry.set("s1", LiveSession::new(site.open_page(), Utc::now()));

		let updated = registry
			.update("s1", |s| s.email = Some("user@example.com".into()))
			.unwrap();
		assert_eq!(updated.email.as_deref(), Some("user@example.com"));
		assert!(registry.update("missing", |_| {}).is_none());

		assert!(registry.delete("s1").is_some());
		assert!(!registry.has("s1"));
		assert!(registry.is_empty());
	}

	#[tokio::test]
	async fn locks_serialize_same_id_only() {
		let locks = Arc::new(SessionLocks::new());
		let held = locks.acquire("a").await;

		let other = tokio::time::timeout(Duration::from_millis(50), locks.acquire("b")).await;
		assert!(other.is_ok());

		let same = tokio::time::timeout(Duration::from_millis(50), locks.acquire("a")).await;
		assert!(same.is_err());

		drop(held);
		assert!(tokio::time::timeout(Duration::from_millis(50), locks.acquire("a")).await.is_ok());
	}

	#[tokio::test]
	async fn forget_keeps_locks_with_queued_callers() {
		let locks = Arc::new(SessionLocks::new());
		let held = locks.acquire("s").await;

		let (acquired_tx, acquired_rx) = tokio::sync::oneshot::channel();
		let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
		let waiter = tokio::spawn({
			let locks = Arc::clone(&locks);
			async move {
				let _guard = locks.acquire("s").await;
				acquired_tx.send(()).expect("test should be listening");
				let _ = release_rx.await;
			}
		});
		tokio::time::sleep(Duration::from_millis(20)).await;

		drop(held);
		locks.forget("s");
		acquired_rx.await.expect("queued caller should get the lock");
		assert!(locks.tracked("s"));

		let third = tokio::time::timeout(Duration::from_millis(50), locks.acquire("s")).await;
		assert!(third.is_err(), "a new caller must queue behind the current holder");

		release_tx.send(()).expect("waiter should be running");
		waiter.await.expect("waiter should finish");
		let third = tokio::time::timeout(Duration::from_millis(50), locks.acquire("s")).await;
		assert!(third.is_ok());
	}

	#[tokio::test]
	async fn forget_drops_idle_locks() {
		let locks = SessionLocks::new();
		drop(locks.acquire("s").await);
		locks.forget("s");
		assert!(!locks.tracked("s"));
	}
}
