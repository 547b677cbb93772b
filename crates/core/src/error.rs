//! Error type for session automation.

use quill_protocol::ErrorCode;
use quill_runtime::RuntimeError;
use serde_json::{Value, json};
use thiserror::Error;

use crate::browser::PageDiagnostics;

pub type Result<T> = std::result::Result<T, QuillError>;

#[derive(Debug, Error)]
pub enum QuillError {
	#[error("session {0} not found")]
	SessionNotFound(String),

	#[error("cannot {operation} session {id}: {reason}")]
	InvalidState { id: String, operation: &'static str, reason: String },

	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error("browser launch failed: {0}")]
	BrowserLaunch(String),

	#[error("browser error: {0}")]
	Browser(String),

	#[error("navigation to {url} failed: {reason}")]
	Navigation { url: String, reason: String },

	#[error("click on {0} was intercepted by another element")]
	ClickIntercepted(String),

	#[error("{operation} timed out after {ms}ms")]
	Timeout { operation: String, ms: u64 },

	#[error("verification did not complete within {ms}ms")]
	VerificationTimeout { ms: u64 },

	#[error("{target} not found on {} (tried: {})", .diagnostics.url, .tried.join(", "))]
	ElementNotFound {
		target: String,
		tried: Vec<String>,
		diagnostics: Box<PageDiagnostics>,
	},

	#[error("no publication: {0}")]
	NoPublication(String),

	#[error("credential error: {0}")]
	Credential(#[from] jsonwebtoken::errors::Error),

	#[error(transparent)]
	Runtime(#[from] RuntimeError),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

impl QuillError {
	pub fn invalid_state(id: &str, operation: &'static str, reason: impl Into<String>) -> Self {
		QuillError::InvalidState {
			id: id.to_string(),
			operation,
			reason: reason.into(),
		}
	}

	pub fn code(&self) -> ErrorCode {
		match self {
			QuillError::SessionNotFound(_) => ErrorCode::SessionNotFound,
			QuillError::InvalidState { .. } => ErrorCode::InvalidState,
			QuillError::InvalidInput(_) => ErrorCode::InvalidInput,
			QuillError::VerificationTimeout { .. } => ErrorCode::VerificationTimeout,
			QuillError::NoPublication(_) => ErrorCode::NoPublication,
			QuillError::ElementNotFound { .. } => ErrorCode::ElementNotFound,
			QuillError::BrowserLaunch(_)
			| QuillError::Browser(_)
			| QuillError::Navigation { .. }
			| QuillError::ClickIntercepted(_)
			| QuillError::Timeout { .. }
			| QuillError::Runtime(_) => ErrorCode::BrowserFailed,
			QuillError::Credential(_) | QuillError::Io(_) | QuillError::Json(_) => ErrorCode::InternalError,
		}
	}

	/// Structured context attached to the error envelope.
	pub fn details(&self) -> Option<Value> {
		match self {
			QuillError::ElementNotFound { target, tried, diagnostics } => Some(json!({
				"target": target,
				"tried": tried,
				"page": diagnostics,
			})),
			QuillError::Navigation { url, .. } => Some(json!({ "url": url })),
			QuillError::VerificationTimeout { ms } => Some(json!({ "timeoutMs": ms })),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn element_not_found_carries_diagnostics() {
		let err = QuillError::ElementNotFound {
			target: "content editor".into(),
			tried: vec!["prosemirror".into(), "any contenteditable".into()],
			diagnostics: Box::new(PageDiagnostics {
				url: "https://x.substack.com/publish/post".into(),
				html_length: 1200,
				..Default::default()
			}),
		};
		assert_eq!(err.code(), ErrorCode::ElementNotFound);
		let msg = err.to_string();
		assert!(msg.contains("x.substack.com/publish/post"));
		assert!(msg.contains("prosemirror, any contenteditable"));
		let details = err.details().unwrap();
		assert_eq!(details["page"]["htmlLength"], 1200);
	}

	#[test]
	fn browser_failures_share_a_code() {
		assert_eq!(QuillError::ClickIntercepted("Continue".into()).code(), ErrorCode::BrowserFailed);
		assert_eq!(QuillError::Runtime(RuntimeError::ChannelClosed).code(), ErrorCode::BrowserFailed);
		assert_eq!(QuillError::SessionNotFound("x".into()).code(), ErrorCode::SessionNotFound);
	}
}
