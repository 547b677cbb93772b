//! Persisted session status and user data.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cookie::Cookie;

/// Lifecycle status of an automation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
	#[default]
	Created,
	AwaitingVerification,
	LoggedIn,
	VerificationTimeout,
	NotFound,
}

impl SessionStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			SessionStatus::Created => "created",
			SessionStatus::AwaitingVerification => "awaiting_verification",
			SessionStatus::LoggedIn => "logged_in",
			SessionStatus::VerificationTimeout => "verification_timeout",
			SessionStatus::NotFound => "not_found",
		}
	}
}

impl fmt::Display for SessionStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Credential bundle captured from an authenticated browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
	#[serde(default)]
	pub cookies: Vec<Cookie>,
	#[serde(default)]
	pub local_storage: BTreeMap<String, String>,
	pub extracted_at: DateTime<Utc>,
}

/// Profile fields scraped after login plus the credential bundle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
	#[serde(default)]
	pub email: Option<String>,
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub profile_url: Option<String>,
	#[serde(default)]
	pub subdomain: Option<String>,
	#[serde(default)]
	pub is_logged_in: bool,
	#[serde(default)]
	pub login_time: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub auth_tokens: Option<AuthTokens>,
}

/// Durable record of one session. Never contains a browser handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
	pub id: String,
	pub status: SessionStatus,
	#[serde(default)]
	pub email: Option<String>,
	pub created_at: DateTime<Utc>,
	pub last_active_at: DateTime<Utc>,
	#[serde(default)]
	pub user_data: Option<UserData>,
}
