//! Browser process lifecycle and CDP connection for quill.
//!
//! This crate owns everything below the page abstraction: locating a
//! Chromium executable, launching it headless with a private profile and a
//! remote-debugging port, probing the DevTools endpoint, and speaking the
//! DevTools protocol over a websocket with id-correlated requests.

pub mod connection;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod fake_transport;
pub mod finder;
pub mod launcher;
pub mod probe;
pub mod process;
pub mod transport;

pub use connection::CdpConnection;
pub use error::{Result, RuntimeError};
pub use launcher::{BrowserProcess, LaunchOptions, launch_chromium};
pub use probe::{BrowserVersion, fetch_cdp_endpoint};
pub use transport::{Transport, TransportParts, TransportReceiver, WebSocketTransport};
