//! [`BrowserPage`] over the Chrome DevTools Protocol.
//!
//! One browser process per session, one page target per browser, attached in
//! flattened mode so every page command carries the target's `sessionId`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use quill_protocol::Cookie;
use quill_runtime::{BrowserProcess, CdpConnection, LaunchOptions, RuntimeError, launch_chromium};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{BrowserLauncher, BrowserPage, ElementHandle, PageDiagnostics, Strategy, script};
use crate::error::{QuillError, Result};

const READY_POLL: Duration = Duration::from_millis(100);

pub struct CdpPage {
	connection: Arc<CdpConnection>,
	session_id: String,
	target_id: String,
	process: Mutex<Option<BrowserProcess>>,
	dialog_open: Arc<AtomicBool>,
	dialog_watch: JoinHandle<()>,
}

impl CdpPage {
	/// Opens a blank page target on `connection` and enables the domains the
	/// flows rely on. `process` is killed when the page closes.
	pub async fn attach(connection: Arc<CdpConnection>, process: Option<BrowserProcess>) -> Result<Self> {
		let created = connection.send("Target.createTarget", json!({ "url": "about:blank" }), None).await?;
		let target_id = string_field(&created, "targetId")?;
		let attached = connection
			.send("Target.attachToTarget", json!({ "targetId": target_id, "flatten": true }), None)
			.await?;
		let session_id = string_field(&attached, "sessionId")?;

		let dialog_open = Arc::new(AtomicBool::new(false));
		let dialog_watch = spawn_dialog_watch(&connection, session_id.clone(), Arc::clone(&dialog_open));

		for domain in ["Page.enable", "Runtime.enable", "Network.enable"] {
			connection.send(domain, json!({}), Some(&session_id)).await?;
		}
		debug!(target = "quill.cdp", %target_id, %session_id, "page attached");

		Ok(Self {
			connection,
			session_id,
			target_id,
			process: Mutex::new(process),
			dialog_open,
			dialog_watch,
		})
	}

	async fn call(&self, method: &str, params: Value) -> Result<Value> {
		Ok(self.connection.send(method, params, Some(&self.session_id)).await?)
	}

	async fn evaluate(&self, expression: &str) -> Result<Value> {
		let result = self
			.call(
				"Runtime.evaluate",
				json!({ "expression": expression, "returnByValue": true, "awaitPromise": true }),
			)
			.await?;
		if let Some(exception) = result.get("exceptionDetails") {
			let text = exception
				.pointer("/exception/description")
				.or_else(|| exception.get("text"))
				.and_then(Value::as_str)
				.unwrap_or("script exception");
			return Err(QuillError::Browser(text.to_string()));
		}
		Ok(result.pointer("/result/value").cloned().unwrap_or(Value::Null))
	}

	async fn evaluate_as<T: for<'de> Deserialize<'de>>(&self, expression: &str) -> Result<T> {
		Ok(serde_json::from_value(self.evaluate(expression).await?)?)
	}

	async fn on_element(&self, element: &ElementHandle, body: &str) -> Result<Value> {
		self.evaluate(&script::on_element(&element.reference, body)).await
	}

	async fn wait_ready(&self, timeout: Duration) -> Result<()> {
		let deadline = Instant::now() + timeout;
		loop {
			match self.evaluate(script::READY_STATE).await {
				Ok(Value::String(state)) if state == "complete" => return Ok(()),
				Ok(_) => {}
				// Execution context is torn down while the new document commits.
				Err(err) => debug!(target = "quill.cdp", error = %err, "readyState probe failed"),
			}
			if Instant::now() >= deadline {
				return Err(QuillError::Timeout {
					operation: "page load".into(),
					ms: timeout.as_millis() as u64,
				});
			}
			tokio::time::sleep(READY_POLL).await;
		}
	}

	async fn enter(&self) -> Result<()> {
		for kind in ["keyDown", "keyUp"] {
			let mut params = json!({
				"type": kind,
				"key": "Enter",
				"code": "Enter",
				"windowsVirtualKeyCode": 13,
				"nativeVirtualKeyCode": 13,
			});
			if kind == "keyDown" {
				params["text"] = json!("\r");
			}
			self.call("Input.dispatchKeyEvent", params).await?;
		}
		Ok(())
	}
}

impl Drop for CdpPage {
	fn drop(&mut self) {
		self.dialog_watch.abort();
	}
}

fn string_field(value: &Value, field: &str) -> Result<String> {
	value
		.get(field)
		.and_then(Value::as_str)
		.map(str::to_string)
		.ok_or_else(|| QuillError::Browser(format!("CDP reply missing {field}")))
}

fn spawn_dialog_watch(connection: &CdpConnection, session_id: String, dialog_open: Arc<AtomicBool>) -> JoinHandle<()> {
	let mut events = connection.subscribe();
	tokio::spawn(async move {
		loop {
			match events.recv().await {
				Ok(event) if event.session_id.as_deref() == Some(session_id.as_str()) => match event.method.as_str() {
					"Page.javascriptDialogOpening" => {
						let kind = event.params.get("type").and_then(Value::as_str).unwrap_or("dialog");
						info!(target = "quill.cdp", kind, "javascript dialog opened");
						dialog_open.store(true, Ordering::SeqCst);
					}
					"Page.javascriptDialogClosed" => dialog_open.store(false, Ordering::SeqCst),
					_ => {}
				},
				Ok(_) => {}
				Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
					debug!(target = "quill.cdp", skipped, "event listener lagged");
				}
				Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
			}
		}
	})
}

#[derive(Deserialize)]
struct HitTest {
	x: f64,
	y: f64,
	clear: bool,
}

#[async_trait]
impl BrowserPage for CdpPage {
	async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
		let navigation = tokio::time::timeout(timeout, self.call("Page.navigate", json!({ "url": url })))
			.await
			.map_err(|_| QuillError::Navigation {
				url: url.to_string(),
				reason: format!("no response within {}ms", timeout.as_millis()),
			})??;
		if let Some(reason) = navigation.get("errorText").and_then(Value::as_str).filter(|e| !e.is_empty()) {
			return Err(QuillError::Navigation {
				url: url.to_string(),
				reason: reason.to_string(),
			});
		}
		self.wait_ready(timeout).await
	}

	async fn url(&self) -> Result<String> {
		self.evaluate_as(script::URL).await
	}

	async fn title(&self) -> Result<String> {
		self.evaluate_as(script::TITLE).await
	}

	async fn reload(&self, timeout: Duration) -> Result<()> {
		self.call("Page.reload", json!({})).await?;
		tokio::time::sleep(READY_POLL).await;
		self.wait_ready(timeout).await
	}

	async fn find(&self, strategy: &Strategy) -> Result<Option<ElementHandle>> {
		let strategy_json = serde_json::to_string(strategy)?;
		self.evaluate_as(&script::find(&strategy_json)).await
	}

	async fn clear(&self, element: &ElementHandle) -> Result<()> {
		self.on_element(element, script::CLEAR).await.map(drop)
	}

	async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<()> {
		self.on_element(element, script::FOCUS).await?;
		for (index, line) in text.split('\n').enumerate() {
			if index > 0 {
				self.enter().await?;
			}
			if !line.is_empty() {
				self.call("Input.insertText", json!({ "text": line })).await?;
			}
		}
		Ok(())
	}

	async fn press_enter(&self, element: &ElementHandle) -> Result<()> {
		self.on_element(element, script::FOCUS).await?;
		self.enter().await
	}

	async fn click(&self, element: &ElementHandle) -> Result<()> {
		let hit: HitTest = serde_json::from_value(self.on_element(element, script::HIT_TEST).await?)?;
		if !hit.clear {
			return Err(QuillError::ClickIntercepted(element.label()));
		}
		for (kind, buttons) in [("mouseMoved", 0), ("mousePressed", 1), ("mouseReleased", 0)] {
			self.call(
				"Input.dispatchMouseEvent",
				json!({ "type": kind, "x": hit.x, "y": hit.y, "button": "left", "buttons": buttons, "clickCount": 1 }),
			)
			.await?;
		}
		Ok(())
	}

	async fn scroll_into_view(&self, element: &ElementHandle) -> Result<()> {
		self.on_element(element, script::SCROLL_INTO_VIEW).await.map(drop)
	}

	async fn dom_click(&self, element: &ElementHandle) -> Result<()> {
		self.on_element(element, script::DOM_CLICK).await.map(drop)
	}

	async fn cookies(&self) -> Result<Vec<Cookie>> {
		let reply = self.call("Network.getAllCookies", json!({})).await?;
		Ok(serde_json::from_value(reply.get("cookies").cloned().unwrap_or_else(|| json!([])))?)
	}

	async fn set_cookie(&self, cookie: &Cookie) -> Result<bool> {
		match self.call("Network.setCookie", serde_json::to_value(cookie)?).await {
			Ok(reply) => Ok(reply.get("success").and_then(Value::as_bool).unwrap_or(true)),
			Err(QuillError::Runtime(RuntimeError::Protocol { message, .. })) => {
				debug!(target = "quill.cdp", cookie = %cookie.name, domain = ?cookie.domain, %message, "cookie rejected");
				Ok(false)
			}
			Err(err) => Err(err),
		}
	}

	async fn local_storage(&self) -> Result<BTreeMap<String, String>> {
		self.evaluate_as(script::LOCAL_STORAGE).await
	}

	async fn set_local_storage(&self, entries: &BTreeMap<String, String>) -> Result<()> {
		let entries_json = serde_json::to_string(entries)?;
		self.evaluate(&script::set_local_storage(&entries_json)).await.map(drop)
	}

	async fn html(&self) -> Result<String> {
		self.evaluate_as(script::HTML).await
	}

	async fn links(&self) -> Result<Vec<String>> {
		self.evaluate_as(script::LINKS).await
	}

	async fn accept_dialog(&self) -> Result<bool> {
		if !self.dialog_open.swap(false, Ordering::SeqCst) {
			return Ok(false);
		}
		self.call("Page.handleJavaScriptDialog", json!({ "accept": true })).await?;
		Ok(true)
	}

	async fn diagnostics(&self) -> Result<PageDiagnostics> {
		self.evaluate_as(script::DIAGNOSTICS).await
	}

	async fn close(&self) -> Result<()> {
		if let Err(err) = self.connection.send("Target.closeTarget", json!({ "targetId": self.target_id }), None).await {
			debug!(target = "quill.cdp", error = %err, "closeTarget failed");
		}
		if let Some(mut process) = self.process.lock().await.take() {
			let _ = self.connection.send("Browser.close", json!({}), None).await;
			process.kill().await?;
			debug!(target = "quill.cdp", port = process.port(), "browser process stopped");
		}
		Ok(())
	}
}

/// Launches one headless Chromium per session.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
	options: LaunchOptions,
	command_timeout: Duration,
}

impl ChromeLauncher {
	pub fn new(options: LaunchOptions, command_timeout: Duration) -> Self {
		Self { options, command_timeout }
	}
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
	async fn launch(&self) -> Result<Arc<dyn BrowserPage>> {
		let mut process = launch_chromium(&self.options)
			.await
			.map_err(|e| QuillError::BrowserLaunch(e.to_string()))?;
		let connection = match CdpConnection::connect(process.endpoint(), self.command_timeout).await {
			Ok(connection) => connection,
			Err(err) => {
				warn!(target = "quill.cdp", error = %err, "could not connect to launched browser");
				let _ = process.kill().await;
				return Err(QuillError::BrowserLaunch(err.to_string()));
			}
		};
		let page = CdpPage::attach(connection, Some(process)).await?;
		Ok(Arc::new(page))
	}
}

#[cfg(test)]
mod tests {
	use quill_runtime::fake_transport;

	use super::*;

	async fn answer(controller: &fake_transport::FakeTransportController, seen: usize, result: Value) -> Value {
		let sent = controller.wait_for_sent(seen + 1).await;
		let request = sent[seen].clone();
		controller.inject_response(request["id"].as_u64().unwrap(), result);
		request
	}

	async fn attached_page() -> (Arc<CdpPage>, fake_transport::FakeTransportController) {
		let (parts, controller) = fake_transport::build();
		let connection = CdpConnection::start(parts, Duration::from_secs(5));
		let attach = tokio::spawn(CdpPage::attach(connection, None));

		let create = answer(&controller, 0, json!({ "targetId": "T1" })).await;
		assert_eq!(create["method"], "Target.createTarget");
		let attach_req = answer(&controller, 1, json!({ "sessionId": "S1" })).await;
		assert_eq!(attach_req["params"]["flatten"], true);
		for index in 2..5 {
			let enable = answer(&controller, index, json!({})).await;
			assert_eq!(enable["sessionId"], "S1");
		}
		(Arc::new(attach.await.unwrap().unwrap()), controller)
	}

	#[tokio::test]
	async fn evaluate_returns_by_value_on_page_session() {
		let (page, controller) = attached_page().await;
		let task = tokio::spawn({
			let page = Arc::clone(&page);
			async move { page.url().await }
		});
		let request = answer(&controller, 5, json!({ "result": { "type": "string", "value": "https://substack.com/home" } })).await;
		assert_eq!(request["method"], "Runtime.evaluate");
		assert_eq!(request["params"]["returnByValue"], true);
		assert_eq!(task.await.unwrap().unwrap(), "https://substack.com/home");
	}

	#[tokio::test]
	async fn script_exception_becomes_browser_error() {
		let (page, controller) = attached_page().await;
		let task = tokio::spawn({
			let page = Arc::clone(&page);
			async move { page.html().await }
		});
		answer(
			&controller,
			5,
			json!({ "result": {}, "exceptionDetails": { "text": "Uncaught", "exception": { "description": "ReferenceError: x" } } }),
		)
		.await;
		let err = task.await.unwrap().unwrap_err();
		assert!(matches!(err, QuillError::Browser(ref m) if m.contains("ReferenceError")));
	}

	#[tokio::test]
	async fn navigation_error_text_is_fatal() {
		let (page, controller) = attached_page().await;
		let task = tokio::spawn({
			let page = Arc::clone(&page);
			async move { page.goto("https://substack.com/sign-in", Duration::from_secs(5)).await }
		});
		answer(&controller, 5, json!({ "frameId": "F", "errorText": "net::ERR_NAME_NOT_RESOLVED" })).await;
		let err = task.await.unwrap().unwrap_err();
		assert!(matches!(err, QuillError::Navigation { ref reason, .. } if reason.contains("ERR_NAME_NOT_RESOLVED")));
	}

	#[tokio::test]
	async fn rejected_cookie_reports_false() {
		let (page, controller) = attached_page().await;
		let task = tokio::spawn({
			let page = Arc::clone(&page);
			async move { page.set_cookie(&Cookie::new("substack.sid", "v").with_domain("bad domain")).await }
		});
		let sent = controller.wait_for_sent(6).await;
		assert_eq!(sent[5]["params"]["domain"], "bad domain");
		controller.inject_error(sent[5]["id"].as_u64().unwrap(), -32000, "Invalid cookie fields");
		assert!(!task.await.unwrap().unwrap());
	}

	#[tokio::test]
	async fn dialog_events_are_tracked_per_session() {
		let (page, controller) = attached_page().await;
		controller.inject_event("Page.javascriptDialogOpening", json!({ "type": "beforeunload" }), Some("OTHER"));
		tokio::time::sleep(Duration::from_millis(20)).await;
		assert!(!page.dialog_open.load(Ordering::SeqCst));

		controller.inject_event("Page.javascriptDialogOpening", json!({ "type": "confirm" }), Some("S1"));
		for _ in 0..100 {
			if page.dialog_open.load(Ordering::SeqCst) {
				break;
			}
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
		let task = tokio::spawn({
			let page = Arc::clone(&page);
			async move { page.accept_dialog().await }
		});
		let request = answer(&controller, 5, json!({})).await;
		assert_eq!(request["method"], "Page.handleJavaScriptDialog");
		assert!(task.await.unwrap().unwrap());
	}
}
