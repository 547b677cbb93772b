//! DevTools endpoint probing.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, RuntimeError};

/// `/json/version` response subset.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserVersion {
	#[serde(rename = "webSocketDebuggerUrl")]
	pub web_socket_debugger_url: String,
	#[serde(rename = "Browser")]
	pub browser: Option<String>,
}

/// Resolves the browser-level websocket endpoint from `/json/version` on `port`.
pub async fn fetch_cdp_endpoint(port: u16) -> Result<BrowserVersion> {
	let client = reqwest::Client::builder()
		.timeout(Duration::from_millis(400))
		.build()
		.map_err(|e| RuntimeError::Endpoint(format!("failed to create HTTP client: {e}")))?;
	let mut last_error = "no response".to_string();

	for url in [
		format!("http://127.0.0.1:{port}/json/version"),
		format!("http://localhost:{port}/json/version"),
	] {
		let response = match client.get(&url).send().await {
			Ok(r) => r,
			Err(e) => {
				last_error = e.to_string();
				continue;
			}
		};

		if !response.status().is_success() {
			last_error = format!("unexpected status {}", response.status());
			continue;
		}

		return response
			.json::<BrowserVersion>()
			.await
			.map_err(|e| RuntimeError::Endpoint(format!("failed to parse /json/version: {e}")));
	}

	Err(RuntimeError::Endpoint(format!("port {port}: {last_error}")))
}
