//! Headless Chromium launch with a private profile and remote debugging.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tempfile::TempDir;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::error::{Result, RuntimeError};
use crate::finder::find_chromium_executable;
use crate::probe::fetch_cdp_endpoint;
use crate::process::free_port;

/// Options for launching one browser process.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
	/// Explicit executable; probed from well-known locations when `None`.
	pub executable: Option<PathBuf>,
	pub headless: bool,
	/// Passes `--no-sandbox`, required when running as root in containers.
	pub no_sandbox: bool,
	pub window_size: (u32, u32),
	pub user_agent: Option<String>,
	pub extra_args: Vec<String>,
	/// How long to wait for the DevTools endpoint after spawn.
	pub startup_timeout: Duration,
}

impl Default for LaunchOptions {
	fn default() -> Self {
		Self {
			executable: None,
			headless: true,
			no_sandbox: false,
			window_size: (1280, 900),
			user_agent: None,
			extra_args: Vec::new(),
			startup_timeout: Duration::from_secs(15),
		}
	}
}

impl LaunchOptions {
	fn args(&self, port: u16, profile: &std::path::Path) -> Vec<String> {
		let mut args = vec![
			format!("--remote-debugging-port={port}"),
			format!("--user-data-dir={}", profile.display()),
			format!("--window-size={},{}", self.window_size.0, self.window_size.1),
			"--no-first-run".to_string(),
			"--no-default-browser-check".to_string(),
			"--disable-background-networking".to_string(),
			"--disable-dev-shm-usage".to_string(),
			"--disable-blink-features=AutomationControlled".to_string(),
		];
		if self.headless {
			args.push("--headless=new".to_string());
			args.push("--disable-gpu".to_string());
		}
		if self.no_sandbox {
			args.push("--no-sandbox".to_string());
		}
		if let Some(agent) = &self.user_agent {
			args.push(format!("--user-agent={agent}"));
		}
		args.extend(self.extra_args.iter().cloned());
		args.push("about:blank".to_string());
		args
	}
}

/// A running browser process. The process is killed when this value drops.
#[derive(Debug)]
pub struct BrowserProcess {
	child: Child,
	port: u16,
	endpoint: String,
	_profile: TempDir,
}

impl BrowserProcess {
	/// Browser-level DevTools websocket URL.
	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	pub fn port(&self) -> u16 {
		self.port
	}

	/// Kills the process and reaps it.
	pub async fn kill(&mut self) -> Result<()> {
		match self.child.try_wait()? {
			Some(_) => Ok(()),
			None => {
				self.child.kill().await?;
				Ok(())
			}
		}
	}
}

/// Launches Chromium and waits until its DevTools endpoint answers.
pub async fn launch_chromium(options: &LaunchOptions) -> Result<BrowserProcess> {
	let executable = find_chromium_executable(options.executable.as_deref()).ok_or_else(|| {
		RuntimeError::Launch(
			"could not find a Chrome/Chromium executable; install Chromium or pass an explicit browser path".to_string(),
		)
	})?;

	let profile = tempfile::Builder::new().prefix("quill-profile-").tempdir()?;
	let port = free_port()?;

	let mut cmd = Command::new(&executable);
	cmd.args(options.args(port, profile.path()))
		.stdin(Stdio::null())
		.stdout(Stdio::null())
		.stderr(Stdio::null())
		.kill_on_drop(true);

	let mut child = cmd
		.spawn()
		.map_err(|e| RuntimeError::Launch(format!("failed to launch {}: {e}", executable.display())))?;
	debug!(target = "quill.runtime", executable = %executable.display(), port, pid = ?child.id(), "browser spawned");

	let poll = Duration::from_millis(200);
	let attempts = (options.startup_timeout.as_millis() / poll.as_millis()).max(1);
	let mut last_error = "endpoint not reachable".to_string();
	for _ in 0..attempts {
		tokio::time::sleep(poll).await;

		if let Some(status) = child.try_wait()? {
			return Err(RuntimeError::Launch(format!(
				"browser exited before its DevTools endpoint became available (status: {status})"
			)));
		}

		match fetch_cdp_endpoint(port).await {
			Ok(info) => {
				info!(target = "quill.runtime", port, browser = ?info.browser, "browser ready");
				return Ok(BrowserProcess {
					child,
					port,
					endpoint: info.web_socket_debugger_url,
					_profile: profile,
				});
			}
			Err(RuntimeError::Endpoint(msg)) => last_error = msg,
			Err(other) => last_error = other.to_string(),
		}
	}

	let _ = child.kill().await;
	Err(RuntimeError::Launch(format!(
		"browser launched but DevTools endpoint not available on port {port} after {}ms: {last_error}",
		options.startup_timeout.as_millis()
	)))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn headless_args_include_profile_and_port() {
		let options = LaunchOptions::default();
		let args = options.args(9333, std::path::Path::new("/tmp/profile"));
		assert!(args.contains(&"--remote-debugging-port=9333".to_string()));
		assert!(args.contains(&"--user-data-dir=/tmp/profile".to_string()));
		assert!(args.contains(&"--headless=new".to_string()));
		assert!(!args.contains(&"--no-sandbox".to_string()));
		assert_eq!(args.last().map(String::as_str), Some("about:blank"));
	}

	#[test]
	fn headful_no_sandbox_args() {
		let options = LaunchOptions {
			headless: false,
			no_sandbox: true,
			user_agent: Some("QuillTest/1.0".into()),
			..Default::default()
		};
		let args = options.args(1, std::path::Path::new("/p"));
		assert!(!args.iter().any(|a| a.starts_with("--headless")));
		assert!(args.contains(&"--no-sandbox".to_string()));
		assert!(args.contains(&"--user-agent=QuillTest/1.0".to_string()));
	}

	#[tokio::test]
	async fn missing_executable_is_a_launch_error() {
		let options = LaunchOptions {
			executable: Some(PathBuf::from("/definitely/missing/chrome")),
			..Default::default()
		};
		// Falls back to probing defaults; only assert the error shape when nothing is installed.
		if find_chromium_executable(options.executable.as_deref()).is_none() {
			let err = launch_chromium(&options).await.unwrap_err();
			assert!(matches!(err, RuntimeError::Launch(_)));
		}
	}
}
