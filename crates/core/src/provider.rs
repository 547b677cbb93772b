//! Substack URLs and the predicates the flows use to read where the browser landed.

use url::Url;

/// Hosts under the publication domain that never belong to a user.
pub const RESERVED_SUBDOMAINS: &[&str] = &[
	"www", "support", "help", "on", "cdn", "api", "substack", "substackcdn", "blog", "open", "reader", "status", "email", "mail",
	"app", "read", "go",
];

#[derive(Debug, Clone)]
pub struct Provider {
	/// Tag embedded in minted credentials.
	pub name: String,
	/// Apex domain of the service and of every publication.
	pub domain: String,
	pub sign_in_path: String,
	/// Page that bounces to sign-in when the browser is not authenticated.
	pub auth_check_path: String,
	/// Pages scanned for publication metadata, in order.
	pub discovery_paths: Vec<String>,
}

impl Default for Provider {
	fn default() -> Self {
		Self {
			name: "substack".into(),
			domain: "substack.com".into(),
			sign_in_path: "/sign-in".into(),
			auth_check_path: "/settings".into(),
			discovery_paths: vec!["/home".into(), "/dashboard".into()],
		}
	}
}

impl Provider {
	pub fn root_url(&self) -> String {
		format!("https://{}/", self.domain)
	}

	pub fn url(&self, path: &str) -> String {
		format!("https://{}{}", self.domain, path)
	}

	pub fn sign_in_url(&self) -> String {
		self.url(&self.sign_in_path)
	}

	pub fn auth_check_url(&self) -> String {
		self.url(&self.auth_check_path)
	}

	pub fn publication_url(&self, subdomain: &str, path: &str) -> String {
		format!("https://{subdomain}.{}{path}", self.domain)
	}

	/// Whether `host` is the provider apex or one of its subdomains.
	pub fn owns_host(&self, host: &str) -> bool {
		let host = host.trim_start_matches('.');
		host == self.domain || host.ends_with(&format!(".{}", self.domain))
	}

	/// Whether the URL is part of the sign-in or verification flow.
	pub fn is_sign_in(&self, url: &str) -> bool {
		let Ok(parsed) = Url::parse(url) else {
			return false;
		};
		let path = parsed.path().to_ascii_lowercase();
		path.starts_with(&self.sign_in_path) || ["/signin", "/login", "/account/login", "/verify"].iter().any(|p| path.starts_with(p))
	}

	/// Whether the URL is a provider page outside the auth flow.
	pub fn is_authenticated_page(&self, url: &str) -> bool {
		let Ok(parsed) = Url::parse(url) else {
			return false;
		};
		matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some_and(|h| self.owns_host(h)) && !self.is_sign_in(url)
	}

	/// Publication subdomain of a `https://{sub}.substack.com` URL, unless reserved.
	pub fn subdomain_of(&self, url: &str) -> Option<String> {
		let parsed = Url::parse(url).ok()?;
		let host = parsed.host_str()?.to_ascii_lowercase();
		let sub = host.strip_suffix(&format!(".{}", self.domain))?;
		(!sub.contains('.') && is_user_subdomain(sub)).then(|| sub.to_string())
	}
}

/// Accepts `[a-z0-9-]` labels that are not reserved service hosts.
pub fn is_user_subdomain(candidate: &str) -> bool {
	!candidate.is_empty()
		&& candidate.len() <= 63
		&& candidate.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
		&& !candidate.starts_with('-')
		&& !RESERVED_SUBDOMAINS.contains(&candidate)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sign_in_detection() {
		let p = Provider::default();
		assert!(p.is_sign_in("https://substack.com/sign-in?redirect=%2Fhome"));
		assert!(p.is_sign_in("https://substack.com/sign-in/verify"));
		assert!(!p.is_sign_in("https://substack.com/home"));
		assert!(!p.is_sign_in("not a url"));
	}

	#[test]
	fn authenticated_page_requires_provider_host() {
		let p = Provider::default();
		assert!(p.is_authenticated_page("https://substack.com/home"));
		assert!(p.is_authenticated_page("https://ada.substack.com/publish/home"));
		assert!(!p.is_authenticated_page("https://substack.com/sign-in"));
		assert!(!p.is_authenticated_page("https://evilsubstack.com/home"));
		assert!(!p.is_authenticated_page("about:blank"));
	}

	#[test]
	fn subdomain_extraction_skips_reserved_hosts() {
		let p = Provider::default();
		assert_eq!(p.subdomain_of("https://adawrites.substack.com/p/hello").as_deref(), Some("adawrites"));
		assert_eq!(p.subdomain_of("https://support.substack.com/hc"), None);
		assert_eq!(p.subdomain_of("https://substack.com/home"), None);
		assert_eq!(p.subdomain_of("https://a.b.substack.com/"), None);
	}
}
