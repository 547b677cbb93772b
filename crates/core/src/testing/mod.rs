//! An in-memory browser for exercising the flows without Chromium.
//!
//! A [`FakeSite`] maps URLs to [`FakeDocument`]s. Pages opened on the site
//! keep their own URL, cookie jar and local storage, and record what the flows
//! did to them as [`SiteEvent`]s. Documents marked `requires_auth` redirect to
//! the sign-in page unless the page holds the site's session cookie.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use quill_protocol::{Cookie, SameSite};

use crate::browser::{BrowserLauncher, BrowserPage};
use crate::error::{QuillError, Result};

mod page;
pub mod preset;
mod selector;

pub use crate::clock::ManualClock;
pub use page::FakePage;

/// What happens when an element is clicked or receives Enter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeAction {
	Navigate(String),
	/// Grants the session cookie and storage, then navigates.
	Authenticate(String),
	/// Makes every element of a group visible.
	Reveal(String),
}

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
	pub tag: String,
	pub attributes: BTreeMap<String, String>,
	pub text: String,
	pub content_editable: bool,
	pub group: Option<String>,
	pub on_click: Option<FakeAction>,
	pub on_enter: Option<FakeAction>,
	pub intercepts_click: bool,
}

impl FakeElement {
	pub fn new(tag: &str) -> Self {
		Self {
			tag: tag.to_string(),
			..Default::default()
		}
	}

	pub fn attr(mut self, name: &str, value: &str) -> Self {
		self.attributes.insert(name.to_string(), value.to_string());
		self
	}

	pub fn text(mut self, text: &str) -> Self {
		self.text = text.to_string();
		self
	}

	pub fn editable(mut self) -> Self {
		self.content_editable = true;
		self.attr("contenteditable", "true")
	}

	/// Hidden until something reveals `group`.
	pub fn group(mut self, group: &str) -> Self {
		self.group = Some(group.to_string());
		self
	}

	pub fn on_click(mut self, action: FakeAction) -> Self {
		self.on_click = Some(action);
		self
	}

	pub fn on_enter(mut self, action: FakeAction) -> Self {
		self.on_enter = Some(action);
		self
	}

	/// Pointer clicks land on an overlay; only script clicks get through.
	pub fn intercepted(mut self) -> Self {
		self.intercepts_click = true;
		self
	}

	pub(crate) fn has_class(&self, class: &str) -> bool {
		self.attributes
			.get("class")
			.is_some_and(|c| c.split_whitespace().any(|c| c == class))
	}

	pub(crate) fn matches(&self, selectors: &str) -> bool {
		selector::matches_list(selectors, self)
	}
}

#[derive(Debug, Clone, Default)]
pub struct FakeDocument {
	pub title: String,
	/// Served verbatim from `html()`; synthesized from the elements otherwise.
	pub html: Option<String>,
	pub links: Vec<String>,
	pub elements: Vec<FakeElement>,
	pub requires_auth: bool,
	pub dialog_on_load: bool,
}

impl FakeDocument {
	pub fn new(title: &str) -> Self {
		Self {
			title: title.to_string(),
			..Default::default()
		}
	}

	pub fn with_elements(mut self, elements: Vec<FakeElement>) -> Self {
		self.elements = elements;
		self
	}

	pub fn html(mut self, html: &str) -> Self {
		self.html = Some(html.to_string());
		self
	}

	pub fn links(mut self, links: &[&str]) -> Self {
		self.links = links.iter().map(|l| l.to_string()).collect();
		self
	}

	pub fn requires_auth(mut self) -> Self {
		self.requires_auth = true;
		self
	}

	pub fn dialog_on_load(mut self) -> Self {
		self.dialog_on_load = true;
		self
	}
}

/// Something a flow did to a fake page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteEvent {
	Navigated(String),
	Cleared(String),
	Typed { field: String, text: String },
	PressedEnter(String),
	Clicked(String),
	DomClicked(String),
	DialogAccepted,
	CookieSet { name: String, domain: Option<String> },
	Closed,
}

pub(crate) struct SiteState {
	pub documents: HashMap<String, FakeDocument>,
	pub events: Vec<SiteEvent>,
	pub sign_in_url: String,
	pub session_cookie: Cookie,
	pub login_storage: BTreeMap<String, String>,
	pub authenticate_after: Option<(usize, String)>,
	pub broken_urls: HashSet<String>,
	pub rejected_cookie_domains: HashSet<String>,
	pub fail_launch: bool,
	pub launches: usize,
	pub closed: usize,
}

impl SiteState {
	/// Exact match first, then the same URL without query and fragment.
	pub fn document(&self, url: &str) -> Option<&FakeDocument> {
		self.documents
			.get(url)
			.or_else(|| self.documents.get(url.split(['?', '#']).next().unwrap_or(url)))
	}
}

/// A scripted website shared by every page opened on it.
#[derive(Clone)]
pub struct FakeSite {
	state: Arc<Mutex<SiteState>>,
}

impl Default for FakeSite {
	fn default() -> Self {
		Self::new()
	}
}

impl FakeSite {
	pub fn new() -> Self {
		let session_cookie = Cookie {
			domain: Some(".substack.com".into()),
			path: Some("/".into()),
			expires: Some(4_102_444_800.0),
			http_only: Some(true),
			secure: Some(true),
			same_site: Some(SameSite::Lax),
			..Cookie::new("substack.sid", "s%3Afake-session")
		};
		Self {
			state: Arc::new(Mutex::new(SiteState {
				documents: HashMap::new(),
				events: Vec::new(),
				sign_in_url: "https://substack.com/sign-in".into(),
				session_cookie,
				login_storage: BTreeMap::new(),
				authenticate_after: None,
				broken_urls: HashSet::new(),
				rejected_cookie_domains: HashSet::new(),
				fail_launch: false,
				launches: 0,
				closed: 0,
			})),
		}
	}

	/// Sign-in, dashboard and editor pages of a writer with one publication.
	pub fn substack() -> Self {
		let site = Self::new();
		preset::install(&site);
		site
	}

	pub(crate) fn state(&self) -> &Arc<Mutex<SiteState>> {
		&self.state
	}

	pub fn add_document(&self, url: &str, document: FakeDocument) {
		self.state.lock().documents.insert(url.to_string(), document);
	}

	/// Edits a registered document in place.
	pub fn edit_document(&self, url: &str, edit: impl FnOnce(&mut FakeDocument)) {
		if let Some(document) = self.state.lock().documents.get_mut(url) {
			edit(document);
		}
	}

	pub fn remove_document(&self, url: &str) {
		self.state.lock().documents.remove(url);
	}

	pub fn set_login_storage(&self, entries: &[(&str, &str)]) {
		self.state.lock().login_storage = entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
	}

	/// Opens a page on `about:blank`. Launch counters are not touched.
	pub fn open_page(&self) -> Arc<dyn BrowserPage> {
		Arc::new(FakePage::new(self.clone()))
	}

	pub fn launcher(&self) -> Arc<dyn BrowserLauncher> {
		Arc::new(FakeLauncher { site: self.clone() })
	}

	pub fn fail_launches(&self, fail: bool) {
		self.state.lock().fail_launch = fail;
	}

	/// Simulates a magic link: after `reads` URL reads on a sign-in page, the
	/// page authenticates itself and lands on `target`.
	pub fn authenticate_after_url_reads(&self, reads: usize, target: &str) {
		self.state.lock().authenticate_after = Some((reads, target.to_string()));
	}

	pub fn break_url(&self, url: &str) {
		self.state.lock().broken_urls.insert(url.to_string());
	}

	pub fn reject_cookie_domain(&self, domain: &str) {
		self.state.lock().rejected_cookie_domains.insert(domain.to_string());
	}

	pub fn launches(&self) -> usize {
		self.state.lock().launches
	}

	pub fn closed_pages(&self) -> usize {
		self.state.lock().closed
	}

	pub fn events(&self) -> Vec<SiteEvent> {
		self.state.lock().events.clone()
	}

	/// Labels of every pointer click that went through.
	pub fn clicked(&self) -> Vec<String> {
		self.events()
			.into_iter()
			.filter_map(|e| match e {
				SiteEvent::Clicked(label) => Some(label),
				_ => None,
			})
			.collect()
	}

	pub fn dom_clicked(&self) -> Vec<String> {
		self.events()
			.into_iter()
			.filter_map(|e| match e {
				SiteEvent::DomClicked(label) => Some(label),
				_ => None,
			})
			.collect()
	}

	pub fn typed(&self) -> Vec<(String, String)> {
		self.events()
			.into_iter()
			.filter_map(|e| match e {
				SiteEvent::Typed { field, text } => Some((field, text)),
				_ => None,
			})
			.collect()
	}

	pub fn navigations(&self) -> Vec<String> {
		self.events()
			.into_iter()
			.filter_map(|e| match e {
				SiteEvent::Navigated(url) => Some(url),
				_ => None,
			})
			.collect()
	}

	pub fn clear_events(&self) {
		self.state.lock().events.clear();
	}
}

pub struct FakeLauncher {
	site: FakeSite,
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
	async fn launch(&self) -> Result<Arc<dyn BrowserPage>> {
		{
			let mut state = self.site.state.lock();
			if state.fail_launch {
				return Err(QuillError::BrowserLaunch("fake browser refused to start".into()));
			}
			state.launches += 1;
		}
		Ok(self.site.open_page())
	}
}
