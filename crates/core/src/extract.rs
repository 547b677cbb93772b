//! Best-effort user-data scraping.
//!
//! Each field comes from its own function returning `Option`; a miss is a
//! debug log, never an error. Callers assemble whatever was found.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use quill_protocol::{AuthTokens, UserData};
use regex::Regex;
use tracing::{debug, warn};

use crate::browser::BrowserPage;
use crate::clock::Clock;
use crate::config::Timeouts;
use crate::locator::Locator;
use crate::provider::{Provider, is_user_subdomain};
use crate::selectors;

/// Local-storage values above this size are not worth carrying in a credential.
const MAX_STORAGE_VALUE: usize = 8 * 1024;

static EMAIL_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r#""email"\s*:\s*"([^"@\s]+@[^"\s]+)""#).expect("EMAIL_RE should compile"));
static NAME_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r#""user"\s*:\s*\{[^{}]*?"name"\s*:\s*"([^"]+)""#).expect("NAME_RE should compile"));
static HANDLE_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r#""handle"\s*:\s*"([A-Za-z0-9_]+)""#).expect("HANDLE_RE should compile"));
static SUBDOMAIN_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r#""subdomain"\s*:\s*"([a-z0-9-]+)""#).expect("SUBDOMAIN_RE should compile"));

/// Everything the page reveals about the signed-in user.
pub async fn user_data(
	page: &dyn BrowserPage,
	provider: &Provider,
	clock: &dyn Clock,
	timeouts: &Timeouts,
	login_email: Option<&str>,
) -> UserData {
	let html = page.html().await.unwrap_or_else(|err| {
		debug!(target = "quill.extract", error = %err, "page html unavailable");
		String::new()
	});
	let links = page.links().await.unwrap_or_default();

	let name = match name_from_html(&html) {
		Some(name) => Some(name),
		None => name_from_page(page, clock, timeouts).await,
	};
	let user = UserData {
		email: email_from_html(&html).or_else(|| login_email.map(str::to_string)),
		name,
		profile_url: profile_url(&html, &links, provider),
		subdomain: subdomain(&html, &links, provider),
		is_logged_in: true,
		login_time: Some(clock.now()),
		auth_tokens: auth_tokens(page, provider, clock.now()).await,
	};
	debug!(
		target = "quill.extract",
		email = user.email.is_some(),
		name = user.name.is_some(),
		profile = user.profile_url.is_some(),
		subdomain = ?user.subdomain,
		"user data extracted"
	);
	user
}

pub fn email_from_html(html: &str) -> Option<String> {
	let found = EMAIL_RE.captures(html).map(|c| c[1].to_string());
	if found.is_none() {
		debug!(target = "quill.extract", "no email in page data");
	}
	found
}

pub fn name_from_html(html: &str) -> Option<String> {
	NAME_RE.captures(html).map(|c| c[1].trim().to_string()).filter(|n| !n.is_empty())
}

async fn name_from_page(page: &dyn BrowserPage, clock: &dyn Clock, timeouts: &Timeouts) -> Option<String> {
	let located = Locator::new(page, clock, timeouts).probe(&selectors::user_name()).await;
	let name = located.map(|l| l.element.text.trim().to_string()).filter(|n| !n.is_empty());
	if name.is_none() {
		debug!(target = "quill.extract", "display name not found");
	}
	name
}

/// `https://substack.com/@handle` from an anchor, else from the embedded handle.
pub fn profile_url(html: &str, links: &[String], provider: &Provider) -> Option<String> {
	let prefix = format!("https://{}/@", provider.domain);
	links
		.iter()
		.find(|l| l.starts_with(&prefix))
		.map(|l| l.split(['?', '#']).next().unwrap_or(l).to_string())
		.or_else(|| HANDLE_RE.captures(html).map(|c| format!("{prefix}{}", &c[1])))
		.or_else(|| {
			debug!(target = "quill.extract", "profile url not found");
			None
		})
}

/// Publication subdomain from embedded metadata first, then outbound links.
pub fn subdomain(html: &str, links: &[String], provider: &Provider) -> Option<String> {
	SUBDOMAIN_RE
		.captures_iter(html)
		.map(|c| c[1].to_string())
		.find(|s| is_user_subdomain(s))
		.or_else(|| links.iter().find_map(|l| provider.subdomain_of(l)))
		.or_else(|| {
			debug!(target = "quill.extract", "publication subdomain not found");
			None
		})
}

/// Current cookie/local-storage bundle, or `None` if the browser would not say.
pub async fn auth_tokens(page: &dyn BrowserPage, provider: &Provider, now: DateTime<Utc>) -> Option<AuthTokens> {
	let cookies = match page.cookies().await {
		Ok(cookies) => cookies,
		Err(err) => {
			warn!(target = "quill.extract", error = %err, "could not read cookies");
			return None;
		}
	};
	let cookies: Vec<_> = cookies
		.into_iter()
		.filter(|c| c.domain.as_deref().is_none_or(|d| provider.owns_host(d)))
		.collect();
	let local_storage: BTreeMap<String, String> = match page.local_storage().await {
		Ok(entries) => entries.into_iter().filter(|(_, v)| v.len() <= MAX_STORAGE_VALUE).collect(),
		Err(err) => {
			debug!(target = "quill.extract", error = %err, "local storage unavailable");
			BTreeMap::new()
		}
	};
	debug!(target = "quill.extract", cookies = cookies.len(), storage = local_storage.len(), "credential bundle captured");
	Some(AuthTokens {
		cookies,
		local_storage,
		extracted_at: now,
	})
}
