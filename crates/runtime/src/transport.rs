//! Message transports carrying CDP JSON between quill and the browser.
//!
//! A transport is split into a sender half, a receiver half that pumps
//! inbound JSON into a channel until the peer goes away, and the channel's
//! receiving end consumed by [`crate::CdpConnection`].

use std::future::Future;
use std::pin::Pin;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use crate::error::Result;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outbound half of a transport.
pub trait Transport: Send {
	fn send(&mut self, message: Value) -> BoxFuture<'_, Result<()>>;
}

/// Inbound half of a transport; runs until the peer disconnects.
pub trait TransportReceiver: Send {
	fn run(self: Box<Self>) -> BoxFuture<'static, Result<()>>;
}

/// A connected transport ready to hand to [`crate::CdpConnection::start`].
pub struct TransportParts {
	pub sender: Box<dyn Transport>,
	pub receiver: Box<dyn TransportReceiver>,
	pub message_rx: mpsc::UnboundedReceiver<Value>,
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Websocket transport to a DevTools endpoint.
pub struct WebSocketTransport;

impl WebSocketTransport {
	pub async fn connect(url: &str) -> Result<TransportParts> {
		let (stream, _) = connect_async(url).await?;
		debug!(target = "quill.cdp", %url, "websocket connected");
		let (sink, stream) = stream.split();
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		Ok(TransportParts {
			sender: Box::new(WsSender { sink }),
			receiver: Box::new(WsReceiver { stream, message_tx }),
			message_rx,
		})
	}
}

struct WsSender {
	sink: SplitSink<WsStream, Message>,
}

impl Transport for WsSender {
	fn send(&mut self, message: Value) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			let text = serde_json::to_string(&message)?;
			self.sink.send(Message::Text(text.into())).await?;
			Ok(())
		})
	}
}

struct WsReceiver {
	stream: SplitStream<WsStream>,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl TransportReceiver for WsReceiver {
	fn run(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
		Box::pin(async move {
			let WsReceiver { mut stream, message_tx } = *self;
			while let Some(frame) = stream.next().await {
				match frame? {
					Message::Text(text) => match serde_json::from_str::<Value>(text.as_str()) {
						Ok(value) => {
							if message_tx.send(value).is_err() {
								break;
							}
						}
						Err(err) => warn!(target = "quill.cdp", error = %err, "dropping unparseable frame"),
					},
					Message::Close(_) => break,
					_ => {}
				}
			}
			debug!(target = "quill.cdp", "websocket closed");
			Ok(())
		})
	}
}
