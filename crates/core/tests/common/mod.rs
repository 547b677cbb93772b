#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use quill::testing::{FakeSite, ManualClock};
use quill::{AutomationConfig, AutomationService, SessionStore};
use tempfile::TempDir;

pub const CODE: &str = "123456";
pub const EMAIL: &str = "ada@example.com";

pub struct Harness {
	pub site: FakeSite,
	pub clock: Arc<ManualClock>,
	pub service: AutomationService,
	_dir: TempDir,
	store_path: PathBuf,
}

impl Harness {
	pub fn new() -> Self {
		Self::with_site(FakeSite::substack())
	}

	pub fn with_site(site: FakeSite) -> Self {
		let dir = TempDir::new().expect("temp dir should be created");
		let store_path = dir.path().join("sessions.json");
		let clock = Arc::new(ManualClock::default());
		let service = build(&site, &clock, &store_path);
		Self {
			site,
			clock,
			service,
			_dir: dir,
			store_path,
		}
	}

	/// A new process over the same store file; live browsers are lost.
	pub fn restart(&mut self) {
		self.service = build(&self.site, &self.clock, &self.store_path);
	}

	pub fn store(&self) -> SessionStore {
		SessionStore::open(&self.store_path)
	}

	pub async fn logged_in_session(&self) -> String {
		let id = self.service.create_session().await.expect("session should be created").session_id;
		self.service.initiate_login(&id, EMAIL).await.expect("login should start");
		self.service
			.submit_verification_code(&id, CODE)
			.await
			.expect("code should be accepted");
		id
	}
}

fn build(site: &FakeSite, clock: &Arc<ManualClock>, store_path: &Path) -> AutomationService {
	let mut config = AutomationConfig::default();
	config.credential.secret = "integration-test-secret".into();
	AutomationService::with_clock(config, Arc::new(SessionStore::open(store_path)), site.launcher(), clock.clone())
}
