use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use quill_protocol::Cookie;
use url::Url;

use super::{FakeAction, FakeElement, FakeSite, SiteEvent, SiteState};
use crate::browser::{BrowserPage, ElementHandle, InputSummary, PageDiagnostics, Strategy};
use crate::error::{QuillError, Result};

const BLANK: &str = "about:blank";

/// One tab on a [`FakeSite`]. Locks are always taken site first, then page.
pub struct FakePage {
	site: FakeSite,
	state: Mutex<PageState>,
}

#[derive(Default)]
struct PageState {
	url: String,
	cookies: Vec<Cookie>,
	local_storage: BTreeMap<String, String>,
	values: HashMap<usize, String>,
	revealed: HashSet<String>,
	dialog_open: bool,
	url_reads: usize,
	closed: bool,
}

impl FakePage {
	pub(crate) fn new(site: FakeSite) -> Self {
		Self {
			site,
			state: Mutex::new(PageState {
				url: BLANK.into(),
				..Default::default()
			}),
		}
	}

	/// Current value typed into the element at `index` of the open document.
	pub fn value(&self, index: usize) -> Option<String> {
		self.state.lock().values.get(&index).cloned()
	}

	fn with_element<T>(
		&self,
		element: &ElementHandle,
		act: impl FnOnce(&mut SiteState, &mut PageState, usize, &FakeElement) -> Result<T>,
	) -> Result<T> {
		let mut site = self.site.state().lock();
		let mut page = self.state.lock();
		ensure_open(&page)?;
		let (url, index) = element
			.reference
			.strip_prefix("fake:")
			.and_then(|r| r.rsplit_once('#'))
			.and_then(|(url, index)| Some((url, index.parse::<usize>().ok()?)))
			.ok_or_else(|| QuillError::Browser(format!("malformed element reference {:?}", element.reference)))?;
		if url != page.url {
			return Err(QuillError::Browser(format!("stale element reference {:?}", element.reference)));
		}
		let found = site
			.document(url)
			.and_then(|d| d.elements.get(index))
			.cloned()
			.ok_or_else(|| QuillError::Browser(format!("element {:?} no longer exists", element.reference)))?;
		act(&mut site, &mut page, index, &found)
	}
}

fn ensure_open(page: &PageState) -> Result<()> {
	if page.closed {
		return Err(QuillError::Browser("target closed".into()));
	}
	Ok(())
}

fn visible(element: &FakeElement, page: &PageState) -> bool {
	element.group.as_ref().is_none_or(|g| page.revealed.contains(g)) && !element.attributes.contains_key("hidden")
}

fn handle(url: &str, index: usize, element: &FakeElement) -> ElementHandle {
	ElementHandle {
		reference: format!("fake:{url}#{index}"),
		tag: element.tag.clone(),
		text: element.text.clone(),
		attributes: element.attributes.clone(),
		content_editable: element.content_editable,
	}
}

fn label(element: &FakeElement) -> String {
	handle("", 0, element).label()
}

fn has_session(site: &SiteState, page: &PageState) -> bool {
	page.cookies.iter().any(|c| c.name == site.session_cookie.name)
}

fn navigate(site: &mut SiteState, page: &mut PageState, url: &str) -> Result<()> {
	if site.broken_urls.contains(url) {
		return Err(QuillError::Navigation {
			url: url.to_string(),
			reason: "net::ERR_CONNECTION_REFUSED".into(),
		});
	}
	let target = match site.document(url) {
		Some(document) if document.requires_auth && !has_session(site, page) => {
			let path = Url::parse(url).map(|u| u.path().to_string()).unwrap_or_default();
			format!("{}?redirect={path}", site.sign_in_url)
		}
		_ => url.to_string(),
	};
	page.dialog_open = site.document(&target).is_some_and(|d| d.dialog_on_load);
	page.url = target.clone();
	page.values.clear();
	page.revealed.clear();
	page.url_reads = 0;
	site.events.push(SiteEvent::Navigated(target));
	Ok(())
}

fn authenticate(site: &SiteState, page: &mut PageState) {
	let cookie = site.session_cookie.clone();
	page.cookies.retain(|c| c.name != cookie.name);
	page.cookies.push(cookie);
	page.local_storage.extend(site.login_storage.clone());
}

fn apply(site: &mut SiteState, page: &mut PageState, action: &FakeAction) -> Result<()> {
	match action {
		FakeAction::Navigate(url) => navigate(site, page, url),
		FakeAction::Authenticate(url) => {
			authenticate(site, page);
			navigate(site, page, url)
		}
		FakeAction::Reveal(group) => {
			page.revealed.insert(group.clone());
			Ok(())
		}
	}
}

fn render(element: &FakeElement, value: Option<&String>) -> String {
	let attributes: String = element.attributes.iter().map(|(k, v)| format!(" {k}=\"{v}\"")).collect();
	let body = value.unwrap_or(&element.text);
	format!("<{tag}{attributes}>{body}</{tag}>", tag = element.tag)
}

#[async_trait]
impl BrowserPage for FakePage {
	async fn goto(&self, url: &str, _timeout: Duration) -> Result<()> {
		let mut site = self.site.state().lock();
		let mut page = self.state.lock();
		ensure_open(&page)?;
		navigate(&mut site, &mut page, url)
	}

	async fn url(&self) -> Result<String> {
		let mut site = self.site.state().lock();
		let mut page = self.state.lock();
		ensure_open(&page)?;
		page.url_reads += 1;
		if let Some((reads, target)) = site.authenticate_after.clone() {
			if page.url_reads >= reads && page.url.starts_with(&site.sign_in_url) {
				authenticate(&site, &mut page);
				navigate(&mut site, &mut page, &target)?;
			}
		}
		Ok(page.url.clone())
	}

	async fn title(&self) -> Result<String> {
		let site = self.site.state().lock();
		let page = self.state.lock();
		ensure_open(&page)?;
		Ok(site.document(&page.url).map(|d| d.title.clone()).unwrap_or_default())
	}

	async fn reload(&self, _timeout: Duration) -> Result<()> {
		let mut site = self.site.state().lock();
		let mut page = self.state.lock();
		ensure_open(&page)?;
		let url = page.url.clone();
		navigate(&mut site, &mut page, &url)
	}

	async fn find(&self, strategy: &Strategy) -> Result<Option<ElementHandle>> {
		let site = self.site.state().lock();
		let page = self.state.lock();
		ensure_open(&page)?;
		let Some(document) = site.document(&page.url) else {
			return Ok(None);
		};
		let mut candidates = document.elements.iter().enumerate().filter(|(_, el)| visible(el, &page));
		let hit = match strategy {
			Strategy::Css { css } => candidates.find(|(_, el)| el.matches(css)),
			Strategy::Last { css } => candidates.filter(|(_, el)| el.matches(css)).last(),
			Strategy::Hinted { css, hints } => candidates.find(|(_, el)| {
				let attributes = el.attributes.values().map(|v| v.to_lowercase()).collect::<Vec<_>>().join(" ");
				el.matches(css) && hints.iter().any(|h| attributes.contains(h))
			}),
			Strategy::Text { tags, needles } => {
				let tags = tags.join(", ");
				candidates.find(|(_, el)| {
					let text = el.text.to_lowercase();
					el.matches(&tags) && needles.iter().any(|n| text.contains(n))
				})
			}
		};
		Ok(hit.map(|(index, el)| handle(&page.url, index, el)))
	}

	async fn clear(&self, element: &ElementHandle) -> Result<()> {
		self.with_element(element, |site, page, index, el| {
			page.values.remove(&index);
			site.events.push(SiteEvent::Cleared(label(el)));
			Ok(())
		})
	}

	async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<()> {
		self.with_element(element, |site, page, index, el| {
			page.values.entry(index).or_default().push_str(text);
			site.events.push(SiteEvent::Typed {
				field: label(el),
				text: text.to_string(),
			});
			Ok(())
		})
	}

	async fn press_enter(&self, element: &ElementHandle) -> Result<()> {
		self.with_element(element, |site, page, _, el| {
			site.events.push(SiteEvent::PressedEnter(label(el)));
			match &el.on_enter {
				Some(action) => apply(site, page, action),
				None => Ok(()),
			}
		})
	}

	async fn click(&self, element: &ElementHandle) -> Result<()> {
		self.with_element(element, |site, page, _, el| {
			if el.intercepts_click {
				return Err(QuillError::ClickIntercepted(label(el)));
			}
			site.events.push(SiteEvent::Clicked(label(el)));
			match &el.on_click {
				Some(action) => apply(site, page, action),
				None => Ok(()),
			}
		})
	}

	async fn scroll_into_view(&self, element: &ElementHandle) -> Result<()> {
		self.with_element(element, |_, _, _, _| Ok(()))
	}

	async fn dom_click(&self, element: &ElementHandle) -> Result<()> {
		self.with_element(element, |site, page, _, el| {
			site.events.push(SiteEvent::DomClicked(label(el)));
			match &el.on_click {
				Some(action) => apply(site, page, action),
				None => Ok(()),
			}
		})
	}

	async fn cookies(&self) -> Result<Vec<Cookie>> {
		let page = self.state.lock();
		ensure_open(&page)?;
		Ok(page.cookies.clone())
	}

	async fn set_cookie(&self, cookie: &Cookie) -> Result<bool> {
		let mut site = self.site.state().lock();
		let mut page = self.state.lock();
		ensure_open(&page)?;
		if cookie.domain.as_ref().is_some_and(|d| site.rejected_cookie_domains.contains(d)) {
			return Ok(false);
		}
		page.cookies.retain(|c| !(c.name == cookie.name && c.domain == cookie.domain));
		page.cookies.push(cookie.clone());
		site.events.push(SiteEvent::CookieSet {
			name: cookie.name.clone(),
			domain: cookie.domain.clone(),
		});
		Ok(true)
	}

	async fn local_storage(&self) -> Result<BTreeMap<String, String>> {
		let page = self.state.lock();
		ensure_open(&page)?;
		if page.url == BLANK {
			return Err(QuillError::Browser("localStorage is not available on about:blank".into()));
		}
		Ok(page.local_storage.clone())
	}

	async fn set_local_storage(&self, entries: &BTreeMap<String, String>) -> Result<()> {
		let mut page = self.state.lock();
		ensure_open(&page)?;
		if page.url == BLANK {
			return Err(QuillError::Browser("localStorage is not available on about:blank".into()));
		}
		page.local_storage.extend(entries.clone());
		Ok(())
	}

	async fn html(&self) -> Result<String> {
		let site = self.site.state().lock();
		let page = self.state.lock();
		ensure_open(&page)?;
		let Some(document) = site.document(&page.url) else {
			return Ok("<html><head></head><body></body></html>".into());
		};
		if let Some(html) = &document.html {
			return Ok(html.clone());
		}
		let body: String = document
			.elements
			.iter()
			.enumerate()
			.filter(|(_, el)| visible(el, &page))
			.map(|(index, el)| render(el, page.values.get(&index)))
			.collect();
		Ok(format!("<html><head><title>{}</title></head><body>{body}</body></html>", document.title))
	}

	async fn links(&self) -> Result<Vec<String>> {
		let site = self.site.state().lock();
		let page = self.state.lock();
		ensure_open(&page)?;
		let Some(document) = site.document(&page.url) else {
			return Ok(Vec::new());
		};
		let anchors = document
			.elements
			.iter()
			.filter(|el| el.tag == "a" && visible(el, &page))
			.filter_map(|el| el.attributes.get("href").cloned());
		Ok(document.links.iter().cloned().chain(anchors).collect())
	}

	async fn accept_dialog(&self) -> Result<bool> {
		let mut site = self.site.state().lock();
		let mut page = self.state.lock();
		ensure_open(&page)?;
		if !page.dialog_open {
			return Ok(false);
		}
		page.dialog_open = false;
		site.events.push(SiteEvent::DialogAccepted);
		Ok(true)
	}

	async fn diagnostics(&self) -> Result<PageDiagnostics> {
		let html_length = self.html().await?.len();
		let site = self.site.state().lock();
		let page = self.state.lock();
		let Some(document) = site.document(&page.url) else {
			return Ok(PageDiagnostics {
				url: page.url.clone(),
				html_length,
				..Default::default()
			});
		};
		let inputs = document
			.elements
			.iter()
			.filter(|el| visible(el, &page) && (matches!(el.tag.as_str(), "input" | "textarea") || el.content_editable))
			.map(|el| InputSummary {
				tag: el.tag.clone(),
				input_type: el.attributes.get("type").cloned(),
				name: el.attributes.get("name").cloned(),
				id: el.attributes.get("id").cloned(),
				placeholder: el.attributes.get("placeholder").cloned(),
				aria_label: el.attributes.get("aria-label").cloned(),
				test_id: el.attributes.get("data-testid").cloned(),
				content_editable: el.content_editable,
			})
			.collect();
		Ok(PageDiagnostics {
			url: page.url.clone(),
			title: document.title.clone(),
			html_length,
			inputs,
		})
	}

	async fn close(&self) -> Result<()> {
		let mut site = self.site.state().lock();
		let mut page = self.state.lock();
		if !page.closed {
			page.closed = true;
			site.closed += 1;
			site.events.push(SiteEvent::Closed);
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::FakeDocument;

	fn site() -> FakeSite {
		let site = FakeSite::new();
		site.add_document("https://substack.com/sign-in", FakeDocument::new("Sign in | Substack"));
		site.add_document(
			"https://substack.com/settings",
			FakeDocument::new("Settings").requires_auth().with_elements(vec![
				FakeElement::new("button").text("Save").on_click(FakeAction::Reveal("done".into())),
				FakeElement::new("span").text("Saved").group("done"),
			]),
		);
		site
	}

	#[tokio::test]
	async fn protected_pages_redirect_without_session_cookie() {
		let site = site();
		let page = site.open_page();
		page.goto("https://substack.com/settings", Duration::from_secs(1)).await.unwrap();
		assert_eq!(page.url().await.unwrap(), "https://substack.com/sign-in?redirect=/settings");

		let cookie = Cookie::new("substack.sid", "x").with_domain(".substack.com");
		assert!(page.set_cookie(&cookie).await.unwrap());
		page.goto("https://substack.com/settings", Duration::from_secs(1)).await.unwrap();
		assert_eq!(page.url().await.unwrap(), "https://substack.com/settings");
	}

	#[tokio::test]
	async fn hidden_groups_appear_after_reveal() {
		let site = site();
		let page = site.open_page();
		page.set_cookie(&Cookie::new("substack.sid", "x")).await.unwrap();
		page.goto("https://substack.com/settings", Duration::from_secs(1)).await.unwrap();

		let saved = Strategy::text(&["span"], &["saved"]);
		assert!(page.find(&saved).await.unwrap().is_none());
		let button = page.find(&Strategy::css("button")).await.unwrap().unwrap();
		page.click(&button).await.unwrap();
		assert!(page.find(&saved).await.unwrap().is_some());
		assert_eq!(site.clicked(), vec!["Save"]);
	}

	#[tokio::test]
	async fn references_go_stale_on_navigation() {
		let site = site();
		let page = site.open_page();
		page.set_cookie(&Cookie::new("substack.sid", "x")).await.unwrap();
		page.goto("https://substack.com/settings", Duration::from_secs(1)).await.unwrap();
		let button = page.find(&Strategy::css("button")).await.unwrap().unwrap();
		page.goto("https://substack.com/sign-in", Duration::from_secs(1)).await.unwrap();
		assert!(matches!(page.click(&button).await, Err(QuillError::Browser(_))));
	}

	#[tokio::test]
	async fn closed_pages_refuse_commands() {
		let site = site();
		let page = site.open_page();
		page.close().await.unwrap();
		page.close().await.unwrap();
		assert_eq!(site.closed_pages(), 1);
		assert!(page.url().await.is_err());
	}
}
