//! Result envelope returned by every HTTP route and offline subcommand.
//!
//! ```json
//! {"ok": false, "op": "session.verify", "error": {"code": "INVALID_STATE", "message": "..."}, "durationMs": 3}
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
	pub ok: bool,
	pub op: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<EnvelopeError>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub duration_ms: Option<u64>,
}

/// Error information for failed operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeError {
	pub code: ErrorCode,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Standardized error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	SessionNotFound,
	InvalidState,
	InvalidInput,
	VerificationTimeout,
	NoPublication,
	ElementNotFound,
	BrowserFailed,
	InternalError,
}

impl ErrorCode {
	pub fn as_str(self) -> &'static str {
		match self {
			ErrorCode::SessionNotFound => "SESSION_NOT_FOUND",
			ErrorCode::InvalidState => "INVALID_STATE",
			ErrorCode::InvalidInput => "INVALID_INPUT",
			ErrorCode::VerificationTimeout => "VERIFICATION_TIMEOUT",
			ErrorCode::NoPublication => "NO_PUBLICATION",
			ErrorCode::ElementNotFound => "ELEMENT_NOT_FOUND",
			ErrorCode::BrowserFailed => "BROWSER_FAILED",
			ErrorCode::InternalError => "INTERNAL_ERROR",
		}
	}
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}
