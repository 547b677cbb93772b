//! Error type for browser process and protocol failures.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
	#[error("browser launch failed: {0}")]
	Launch(String),

	#[error("DevTools endpoint unavailable: {0}")]
	Endpoint(String),

	#[error("transport error: {0}")]
	Transport(String),

	#[error("CDP command {method} failed ({code}): {message}")]
	Protocol { method: String, code: i64, message: String },

	#[error("CDP command {method} timed out after {ms}ms")]
	Timeout { method: String, ms: u64 },

	#[error("CDP connection closed")]
	ChannelClosed,

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for RuntimeError {
	fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
		RuntimeError::Transport(err.to_string())
	}
}
