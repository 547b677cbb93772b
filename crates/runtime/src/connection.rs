//! Request/response correlation for the DevTools protocol.
//!
//! # Message flow
//!
//! 1. [`CdpConnection::send`] allocates the next id and parks a oneshot sender
//!    under it
//! 2. the request goes out through the transport
//! 3. the dispatch loop reads inbound JSON; responses complete the parked
//!    sender with the same id, events fan out over a broadcast channel
//! 4. the caller either receives its result, times out, or observes
//!    [`RuntimeError::ChannelClosed`] when the browser disconnects
//!
//! The dispatch loop holds only a weak reference, so dropping the last
//! [`Arc<CdpConnection>`] tears the loop down.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use quill_protocol::cdp::{CdpEvent, CdpMessage, CdpRequest};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::{Result, RuntimeError};
use crate::transport::{Transport, TransportParts, WebSocketTransport};

const EVENT_CAPACITY: usize = 256;

struct Pending {
	method: String,
	tx: oneshot::Sender<Result<Value>>,
}

pub struct CdpConnection {
	last_id: AtomicU64,
	pending: Mutex<HashMap<u64, Pending>>,
	sender: tokio::sync::Mutex<Box<dyn Transport>>,
	events: broadcast::Sender<CdpEvent>,
	command_timeout: Duration,
	tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CdpConnection {
	/// Connects to a browser-level websocket endpoint.
	pub async fn connect(endpoint: &str, command_timeout: Duration) -> Result<Arc<Self>> {
		let parts = WebSocketTransport::connect(endpoint).await?;
		Ok(Self::start(parts, command_timeout))
	}

	/// Spawns the reader and dispatch tasks over an already connected transport.
	pub fn start(parts: TransportParts, command_timeout: Duration) -> Arc<Self> {
		let TransportParts { sender, receiver, message_rx } = parts;
		let (events, _) = broadcast::channel(EVENT_CAPACITY);

		let connection = Arc::new(Self {
			last_id: AtomicU64::new(0),
			pending: Mutex::new(HashMap::new()),
			sender: tokio::sync::Mutex::new(sender),
			events,
			command_timeout,
			tasks: Mutex::new(Vec::new()),
		});

		let reader = tokio::spawn(async move {
			if let Err(err) = receiver.run().await {
				warn!(target = "quill.cdp", error = %err, "transport reader failed");
			}
		});
		let dispatcher = tokio::spawn(dispatch_loop(Arc::downgrade(&connection), message_rx));
		connection.tasks.lock().extend([reader, dispatcher]);
		connection
	}

	/// Sends a command and waits for its result.
	///
	/// `session_id` routes the command to an attached target; `None` addresses
	/// the browser itself.
	pub async fn send(&self, method: &str, params: Value, session_id: Option<&str>) -> Result<Value> {
		let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
		let (tx, rx) = oneshot::channel();
		self.pending.lock().insert(id, Pending { method: method.to_string(), tx });

		let request = CdpRequest {
			id,
			method: method.to_string(),
			params,
			session_id: session_id.map(str::to_string),
		};
		trace!(target = "quill.cdp", id, method, "send");
		let message = serde_json::to_value(&request)?;
		if let Err(err) = self.sender.lock().await.send(message).await {
			self.pending.lock().remove(&id);
			return Err(err);
		}

		match tokio::time::timeout(self.command_timeout, rx).await {
			Ok(Ok(result)) => result,
			Ok(Err(_)) => Err(RuntimeError::ChannelClosed),
			Err(_) => {
				self.pending.lock().remove(&id);
				Err(RuntimeError::Timeout {
					method: method.to_string(),
					ms: self.command_timeout.as_millis() as u64,
				})
			}
		}
	}

	/// Subscribes to every event received after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<CdpEvent> {
		self.events.subscribe()
	}

	pub fn command_timeout(&self) -> Duration {
		self.command_timeout
	}

	fn dispatch(&self, message: CdpMessage) {
		match message {
			CdpMessage::Response(response) => {
				let Some(pending) = self.pending.lock().remove(&response.id) else {
					debug!(target = "quill.cdp", id = response.id, "response for unknown request");
					return;
				};
				let result = match response.error {
					Some(error) => Err(RuntimeError::Protocol {
						method: pending.method,
						code: error.code,
						message: error.message,
					}),
					None => Ok(response.result.unwrap_or(Value::Null)),
				};
				let _ = pending.tx.send(result);
			}
			CdpMessage::Event(event) => {
				trace!(target = "quill.cdp", method = %event.method, "event");
				let _ = self.events.send(event);
			}
		}
	}

	/// Drops every parked sender so waiting callers see `ChannelClosed`.
	fn fail_pending(&self) {
		let drained: Vec<_> = self.pending.lock().drain().collect();
		if !drained.is_empty() {
			debug!(target = "quill.cdp", count = drained.len(), "failing pending requests");
		}
	}
}

impl Drop for CdpConnection {
	fn drop(&mut self) {
		for task in self.tasks.get_mut().drain(..) {
			task.abort();
		}
	}
}

async fn dispatch_loop(connection: Weak<CdpConnection>, mut message_rx: mpsc::UnboundedReceiver<Value>) {
	while let Some(value) = message_rx.recv().await {
		let Some(connection) = connection.upgrade() else {
			break;
		};
		match serde_json::from_value::<CdpMessage>(value) {
			Ok(message) => connection.dispatch(message),
			Err(err) => warn!(target = "quill.cdp", error = %err, "unrecognised CDP message"),
		}
	}
	if let Some(connection) = connection.upgrade() {
		connection.fail_pending();
	}
	debug!(target = "quill.cdp", "dispatch loop ended");
}
