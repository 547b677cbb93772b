//! Cookie shape shared by CDP payloads and persisted credential bundles.
//!
//! Field names follow the CDP `Network.Cookie` / `Network.setCookie` schema so the
//! same struct can be read from `Network.getAllCookies` and written back verbatim.

use serde::{Deserialize, Serialize};

/// Cookie `SameSite` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
	Strict,
	Lax,
	None,
}

/// A browser cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
	pub name: String,
	pub value: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub domain: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub path: Option<String>,
	/// Expiry in Unix seconds. `None` or a negative value marks a session cookie.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub secure: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub http_only: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub same_site: Option<SameSite>,
}

impl Cookie {
	/// Creates a session cookie with no domain metadata.
	pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			value: value.into(),
			domain: None,
			path: None,
			expires: None,
			secure: None,
			http_only: None,
			same_site: None,
		}
	}

	/// Sets the cookie domain.
	pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
		self.domain = Some(domain.into());
		self
	}

	/// Sets the cookie expiry (Unix seconds).
	pub fn with_expires(mut self, expires: f64) -> Self {
		self.expires = Some(expires);
		self
	}

	/// Returns `true` for cookies without a persistent expiry.
	pub fn is_session(&self) -> bool {
		self.expires.is_none_or(|e| e < 0.0)
	}
}
