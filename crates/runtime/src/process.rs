//! Port helpers for browser launch.

use std::net::TcpListener;

/// Asks the OS for an unused localhost port.
///
/// The port is released before returning, so another process may grab it
/// before the browser binds; the launch then fails with an endpoint error.
pub fn free_port() -> std::io::Result<u16> {
	let listener = TcpListener::bind(("127.0.0.1", 0))?;
	Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn free_port_is_bindable() {
		let port = free_port().unwrap();
		assert_ne!(port, 0);
		assert!(TcpListener::bind(("127.0.0.1", port)).is_ok());
	}
}
