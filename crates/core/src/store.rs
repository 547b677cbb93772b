//! Durable session records in a single JSON file.
//!
//! Every mutation re-reads the file, applies the change and writes the whole
//! mapping back through a temp file and rename, all under one process-wide
//! mutex. Fine for tens of sessions; per-key storage would be needed beyond that.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use quill_protocol::SessionSnapshot;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::age;
use crate::error::Result;

const STORE_SCHEMA_VERSION: u32 = 1;

/// On-disk format of the store file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreFile {
	pub schema: u32,
	#[serde(default)]
	pub sessions: BTreeMap<String, SessionSnapshot>,
}

impl Default for StoreFile {
	fn default() -> Self {
		Self {
			schema: STORE_SCHEMA_VERSION,
			sessions: BTreeMap::new(),
		}
	}
}

#[derive(Debug)]
pub struct SessionStore {
	path: PathBuf,
	lock: Mutex<()>,
}

impl SessionStore {
	pub fn open(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			lock: Mutex::new(()),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Replaces the record for `id` with a complete snapshot.
	pub fn save(&self, id: &str, snapshot: &SessionSnapshot) -> Result<()> {
		let _guard = self.lock.lock();
		let mut file = self.read();
		file.sessions.insert(id.to_string(), snapshot.clone());
		self.write(&file)
	}

	pub fn get(&self, id: &str) -> Option<SessionSnapshot> {
		let _guard = self.lock.lock();
		self.read().sessions.remove(id)
	}

	pub fn get_all(&self) -> BTreeMap<String, SessionSnapshot> {
		let _guard = self.lock.lock();
		self.read().sessions
	}

	/// Returns whether a record was removed.
	pub fn delete(&self, id: &str) -> Result<bool> {
		let _guard = self.lock.lock();
		let mut file = self.read();
		if file.sessions.remove(id).is_none() {
			return Ok(false);
		}
		self.write(&file)?;
		Ok(true)
	}

	pub fn update_last_active(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
		let _guard = self.lock.lock();
		let mut file = self.read();
		let Some(snapshot) = file.sessions.get_mut(id) else {
			return Ok(false);
		};
		snapshot.last_active_at = now;
		self.write(&file)?;
		Ok(true)
	}

	/// Deletes records whose age since creation is at least `max_age`.
	pub fn cleanup_expired(&self, max_age: Duration, now: DateTime<Utc>) -> Result<usize> {
		let _guard = self.lock.lock();
		let mut file = self.read();
		let before = file.sessions.len();
		file.sessions.retain(|_, s| age(now, s.created_at) < max_age);
		let removed = before - file.sessions.len();
		if removed > 0 {
			self.write(&file)?;
			debug!(target = "quill.store", removed, "expired session records deleted");
		}
		Ok(removed)
	}

	/// Missing file is empty; unreadable or corrupt file is logged and treated as empty.
	fn read(&self) -> StoreFile {
		let content = match fs::read_to_string(&self.path) {
			Ok(content) => content,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => return StoreFile::default(),
			Err(err) => {
				warn!(target = "quill.store", path = %self.path.display(), error = %err, "session store unreadable");
				return StoreFile::default();
			}
		};
		match serde_json::from_str::<StoreFile>(&content) {
			Ok(file) => file,
			Err(err) => {
				warn!(target = "quill.store", path = %self.path.display(), error = %err, "session store corrupt; starting empty");
				StoreFile::default()
			}
		}
	}

	fn write(&self, file: &StoreFile) -> Result<()> {
		if let Some(parent) = self.path.parent() {
			fs::create_dir_all(parent)?;
		}
		let json = serde_json::to_string_pretty(file)?;
		let tmp = self.path.with_extension("json.tmp");
		fs::write(&tmp, json)?;
		fs::rename(&tmp, &self.path)?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use chrono::TimeDelta;
	use quill_protocol::SessionStatus;
	use tempfile::TempDir;

	use super::*;

	fn snapshot(id: &str, created_at: DateTime<Utc>) -> SessionSnapshot {
		SessionSnapshot {
			id: id.to_string(),
			status: SessionStatus::Created,
			email: None,
			created_at,
			last_active_at: created_at,
			user_data: None,
		}
	}

	fn store() -> (TempDir, SessionStore) {
		let dir = TempDir::new().unwrap();
		let store = SessionStore::open(dir.path().join("nested").join("sessions.json"));
		(dir, store)
	}

	#[test]
	fn save_get_delete() {
		let (_dir, store) = store();
		let now = Utc::now();
		assert!(store.get("a").is_none());

		store.save("a", &snapshot("a", now)).unwrap();
		store.save("b", &snapshot("b", now)).unwrap();
		assert_eq!(store.get("a").unwrap().id, "a");
		assert_eq!(store.get_all().len(), 2);

		assert!(store.delete("a").unwrap());
		assert!(!store.delete("a").unwrap());
		assert_eq!(store.get_all().keys().collect::<Vec<_>>(), vec!["b"]);
	}

	#[test]
	fn records_survive_reopen() {
		let (_dir, store) = store();
		let now = Utc::now();
		store.save("a", &snapshot("a", now)).unwrap();
		let reopened = SessionStore::open(store.path().to_path_buf());
		assert_eq!(reopened.get("a").unwrap().created_at, now);
	}

	#[test]
	fn corrupt_file_reads_as_empty() {
		let (_dir, store) = store();
		fs::create_dir_all(store.path().parent().unwrap()).unwrap();
		fs::write(store.path(), "{ not json").unwrap();
		assert!(store.get_all().is_empty());

		store.save("a", &snapshot("a", Utc::now())).unwrap();
		assert_eq!(store.get_all().len(), 1);
	}

	#[test]
	fn update_last_active_touches_only_existing() {
		let (_dir, store) = store();
		let created = Utc::now() - TimeDelta::hours(2);
		store.save("a", &snapshot("a", created)).unwrap();

		let now = Utc::now();
		assert!(store.update_last_active("a", now).unwrap());
		assert!(!store.update_last_active("missing", now).unwrap());
		let saved = store.get("a").unwrap();
		assert_eq!(saved.last_active_at, now);
		assert_eq!(saved.created_at, created);
	}

	#[test]
	fn cleanup_expired_uses_creation_age() {
		let (_dir, store) = store();
		let now = Utc::now();
		store.save("old", &snapshot("old", now - TimeDelta::days(100))).unwrap();
		store.save("new", &snapshot("new", now - TimeDelta::days(1))).unwrap();

		assert_eq!(store.cleanup_expired(Duration::from_secs(90 * 86_400), now).unwrap(), 1);
		assert!(store.get("old").is_none());
		assert_eq!(store.cleanup_expired(Duration::ZERO, now).unwrap(), 1);
		assert!(store.get_all().is_empty());
	}
}
