//! In-memory transport for exercising [`crate::CdpConnection`] without a browser.
//!
//! ```ignore
//! let (parts, controller) = fake_transport::build();
//! let connection = CdpConnection::start(parts, Duration::from_secs(1));
//! let reply = tokio::spawn(async move { connection.send("Page.enable", json!({}), None).await });
//! let sent = controller.wait_for_sent(1).await;
//! controller.inject_response(sent[0]["id"].as_u64().unwrap(), json!({}));
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::transport::{BoxFuture, Transport, TransportParts, TransportReceiver};

/// Builds a connected fake transport and its controller.
pub fn build() -> (TransportParts, FakeTransportController) {
	let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
	let (message_tx, message_rx) = mpsc::unbounded_channel();
	let sent = Arc::new(Mutex::new(Vec::new()));

	let parts = TransportParts {
		sender: Box::new(FakeSender { sent: Arc::clone(&sent) }),
		receiver: Box::new(FakeReceiver { inbound_rx, message_tx }),
		message_rx,
	};
	(parts, FakeTransportController { inbound_tx, sent })
}

/// Injects inbound messages and inspects outbound ones.
pub struct FakeTransportController {
	inbound_tx: mpsc::UnboundedSender<Value>,
	sent: Arc<Mutex<Vec<Value>>>,
}

impl FakeTransportController {
	pub fn inject(&self, message: Value) {
		let _ = self.inbound_tx.send(message);
	}

	pub fn inject_response(&self, id: u64, result: Value) {
		self.inject(json!({ "id": id, "result": result }));
	}

	pub fn inject_error(&self, id: u64, code: i64, message: &str) {
		self.inject(json!({ "id": id, "error": { "code": code, "message": message } }));
	}

	pub fn inject_event(&self, method: &str, params: Value, session_id: Option<&str>) {
		let mut event = json!({ "method": method, "params": params });
		if let Some(session_id) = session_id {
			event["sessionId"] = json!(session_id);
		}
		self.inject(event);
	}

	/// Messages sent so far.
	pub fn sent(&self) -> Vec<Value> {
		self.sent.lock().clone()
	}

	/// Polls until at least `count` messages were sent (gives up after ~2s).
	pub async fn wait_for_sent(&self, count: usize) -> Vec<Value> {
		for _ in 0..400 {
			let sent = self.sent();
			if sent.len() >= count {
				return sent;
			}
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
		self.sent()
	}
}

struct FakeSender {
	sent: Arc<Mutex<Vec<Value>>>,
}

impl Transport for FakeSender {
	fn send(&mut self, message: Value) -> BoxFuture<'_, Result<()>> {
		self.sent.lock().push(message);
		Box::pin(async { Ok(()) })
	}
}

struct FakeReceiver {
	inbound_rx: mpsc::UnboundedReceiver<Value>,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl TransportReceiver for FakeReceiver {
	fn run(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
		Box::pin(async move {
			let FakeReceiver { mut inbound_rx, message_tx } = *self;
			while let Some(message) = inbound_rx.recv().await {
				if message_tx.send(message).is_err() {
					break;
				}
			}
			Ok(())
		})
	}
}
