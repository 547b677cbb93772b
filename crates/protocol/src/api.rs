//! Request and result bodies of the session lifecycle surface.
//!
//! All bodies are camelCase JSON. Results double as the return values of the
//! automation service so the HTTP layer can forward them unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{SessionSnapshot, SessionStatus, UserData};

/// Result of creating a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
	pub session_id: String,
}

/// Result of refreshing a session's credential bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshOutcome {
	pub success: bool,
}

/// Result of closing a session's browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseOutcome {
	pub closed: bool,
}

/// Liveness report of the HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
	pub status: String,
	pub active_sessions: usize,
}

/// Body of `initiate login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
	pub email: String,
}

/// Result of `initiate login`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginStarted {
	pub status: SessionStatus,
	pub has_verification_input: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_data: Option<UserData>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub credential: Option<String>,
}

/// Body of `submit verification`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
	pub code: String,
}

/// Body of `wait for email verification`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitVerificationRequest {
	#[serde(default)]
	pub timeout_ms: Option<u64>,
}

/// Result of a verification step (code submission or email-link wait).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
	pub status: SessionStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_data: Option<UserData>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub credential: Option<String>,
}

/// Result of `get session status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusReport {
	pub exists: bool,
	pub status: SessionStatus,
	pub is_active: bool,
	pub is_persistent: bool,
	pub needs_reconnection: bool,
}

/// One row of a session listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
	pub id: String,
	pub status: SessionStatus,
	#[serde(default)]
	pub email: Option<String>,
	pub created_at: DateTime<Utc>,
	#[serde(default)]
	pub last_active_at: Option<DateTime<Utc>>,
	#[serde(default)]
	pub subdomain: Option<String>,
	pub is_logged_in: bool,
}

impl From<&SessionSnapshot> for SessionSummary {
	fn from(snapshot: &SessionSnapshot) -> Self {
		let user = snapshot.user_data.as_ref();
		Self {
			id: snapshot.id.clone(),
			status: snapshot.status,
			email: snapshot.email.clone(),
			created_at: snapshot.created_at,
			last_active_at: Some(snapshot.last_active_at),
			subdomain: user.and_then(|u| u.subdomain.clone()),
			is_logged_in: user.is_some_and(|u| u.is_logged_in),
		}
	}
}

/// Result of `list sessions`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionListing {
	pub active: Vec<SessionSummary>,
	pub persistent: Vec<SessionSummary>,
}

/// Result of `reconnect / recreate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreOutcome {
	pub success: bool,
	pub reconnected: bool,
	pub recreated: bool,
	/// Whether the restored cookies kept the auth-check page off the sign-in path.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub verified: Option<bool>,
}

/// Body of `create post`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRequest {
	pub title: String,
	pub content: String,
	#[serde(default)]
	pub subtitle: Option<String>,
	#[serde(default)]
	pub is_draft: bool,
	/// Publication subdomain override.
	#[serde(default)]
	pub subdomain: Option<String>,
}

/// Result of `create post`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResult {
	pub success: bool,
	#[serde(default)]
	pub post_url: Option<String>,
	pub current_url: String,
	pub created_at: DateTime<Utc>,
	pub is_draft: bool,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn post_request_defaults_to_publish() {
		let req: PostRequest = serde_json::from_str(r#"{"title": "Hello", "content": "Body"}"#).unwrap();
		assert!(!req.is_draft);
		assert!(req.subtitle.is_none());
		assert!(req.subdomain.is_none());
	}

	#[test]
	fn summary_reads_publication_from_user_data() {
		let now = Utc::now();
		let mut snapshot = SessionSnapshot {
			id: "s1".into(),
			status: SessionStatus::LoggedIn,
			email: Some("ada@example.com".into()),
			created_at: now,
			last_active_at: now,
			user_data: None,
		};
		let bare = SessionSummary::from(&snapshot);
		assert!(!bare.is_logged_in);
		assert!(bare.subdomain.is_none());

		snapshot.user_data = Some(UserData {
			subdomain: Some("adawrites".into()),
			is_logged_in: true,
			..Default::default()
		});
		let summary = SessionSummary::from(&snapshot);
		assert!(summary.is_logged_in);
		assert_eq!(summary.subdomain.as_deref(), Some("adawrites"));
		assert_eq!(summary.last_active_at, Some(now));
	}

	#[test]
	fn status_report_uses_camel_case() {
		let report = SessionStatusReport {
			exists: true,
			status: SessionStatus::LoggedIn,
			is_active: false,
			is_persistent: true,
			needs_reconnection: true,
		};
		let value = serde_json::to_value(&report).unwrap();
		assert_eq!(value["needsReconnection"], true);
		assert_eq!(value["status"], "logged_in");
	}
}
