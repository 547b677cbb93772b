//! Chrome DevTools Protocol message envelopes.
//!
//! Requests carry an `id` that the browser echoes in the matching response.
//! Events carry no `id`. When a target is attached in flattened mode, both
//! directions also carry the target's `sessionId`.
//!
//! ```json
//! {"id": 7, "method": "Page.navigate", "params": {"url": "https://substack.com"}, "sessionId": "9A3F"}
//! {"id": 7, "result": {"frameId": "..."}, "sessionId": "9A3F"}
//! {"method": "Page.javascriptDialogOpening", "params": {"type": "confirm"}, "sessionId": "9A3F"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outgoing CDP command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdpRequest {
	pub id: u64,
	pub method: String,
	#[serde(default)]
	pub params: Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Error payload of a failed CDP command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdpErrorPayload {
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<String>,
}

/// Reply to a [`CdpRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdpResponse {
	pub id: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<CdpErrorPayload>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Unsolicited notification from the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdpEvent {
	pub method: String,
	#[serde(default)]
	pub params: Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Any inbound CDP message. Responses are distinguished by their `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CdpMessage {
	Response(CdpResponse),
	Event(CdpEvent),
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn response_with_id_parses_as_response() {
		let msg: CdpMessage = serde_json::from_value(json!({"id": 3, "result": {"ok": true}})).unwrap();
		match msg {
			CdpMessage::Response(resp) => {
				assert_eq!(resp.id, 3);
				assert_eq!(resp.result, Some(json!({"ok": true})));
			}
			CdpMessage::Event(_) => panic!("expected response"),
		}
	}

	#[test]
	fn message_without_id_parses_as_event() {
		let msg: CdpMessage = serde_json::from_value(json!({
			"method": "Page.javascriptDialogOpening",
			"params": {"type": "confirm", "message": "Leave?"},
			"sessionId": "S1"
		}))
		.unwrap();
		match msg {
			CdpMessage::Event(event) => {
				assert_eq!(event.method, "Page.javascriptDialogOpening");
				assert_eq!(event.session_id.as_deref(), Some("S1"));
			}
			CdpMessage::Response(_) => panic!("expected event"),
		}
	}

	#[test]
	fn request_omits_absent_session() {
		let req = CdpRequest {
			id: 1,
			method: "Browser.getVersion".into(),
			params: json!({}),
			session_id: None,
		};
		let value = serde_json::to_value(&req).unwrap();
		assert!(value.get("sessionId").is_none());
	}
}
