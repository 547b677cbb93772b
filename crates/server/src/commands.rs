use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use quill::protocol::{SessionSummary, SessionStatus};
use quill::{AutomationService, ChromeLauncher, SessionStore, spawn_scheduler};
use serde::Serialize;
use tracing::info;

use crate::cli::{self, Cli, Commands, ServeArgs};
use crate::output::{OutputFormat, ResultBuilder, print_result};
use crate::routes;

pub async fn dispatch(cli: Cli) -> Result<()> {
	let store_path = cli.store_path();
	match cli.command {
		Commands::Serve(args) => serve(&args, &store_path).await,
		Commands::Sessions => sessions(&store_path, cli.format),
		Commands::Cleanup { max_age_days } => cleanup(&store_path, max_age_days, cli.format),
	}
}

async fn serve(args: &ServeArgs, store_path: &Path) -> Result<()> {
	let config = args.automation_config();
	let launcher = Arc::new(ChromeLauncher::new(config.launch.clone(), config.timeouts.command));
	let store = Arc::new(SessionStore::open(store_path));
	let service = Arc::new(AutomationService::new(config, store, launcher));
	let scheduler = spawn_scheduler(service.clone());

	let listener = tokio::net::TcpListener::bind(args.bind)
		.await
		.with_context(|| format!("failed to bind to {}", args.bind))?;
	info!(
		target = "quill.server",
		addr = %args.bind,
		store = %store_path.display(),
		"listening"
	);

	let served = axum::serve(listener, routes::router(service.clone()))
		.with_graceful_shutdown(shutdown_signal())
		.await;

	scheduler.abort();
	service.shutdown().await;
	info!(target = "quill.server", "stopped");
	served.context("server error")
}

async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		tracing::warn!(target = "quill.server", error = %err, "could not listen for ctrl-c");
		std::future::pending::<()>().await;
	}
	info!(target = "quill.server", "shutdown requested");
}

fn sessions(store_path: &Path, format: OutputFormat) -> Result<()> {
	let store = SessionStore::open(store_path);
	let rows: Vec<SessionSummary> = store
		.get_all()
		.values()
		.map(SessionSummary::from)
		.collect();
	let envelope = ResultBuilder::new("sessions.list").data(rows).build();
	print_result(&envelope, format, |rows| render_sessions(rows))?;
	Ok(())
}

fn render_sessions(rows: &[SessionSummary]) -> String {
	if rows.is_empty() {
		return "no stored sessions".into();
	}
	rows.iter()
		.map(|s| {
			let reconnect = if s.status == SessionStatus::LoggedIn { "  (reconnectable)" } else { "" };
			format!(
				"{}  {:<22}  {:<24}  {}{reconnect}",
				s.id,
				s.status.as_str(),
				s.email.as_deref().unwrap_or("-"),
				s.created_at.format("%Y-%m-%d %H:%M"),
			)
		})
		.collect::<Vec<_>>()
		.join("\n")
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OfflineCleanup {
	expired: usize,
	remaining: usize,
}

fn cleanup(store_path: &Path, max_age_days: u64, format: OutputFormat) -> Result<()> {
	let store = SessionStore::open(store_path);
	let builder = ResultBuilder::new("sessions.cleanup");
	let envelope = match store.cleanup_expired(cli::days(max_age_days), Utc::now()) {
		Ok(expired) => builder
			.data(OfflineCleanup {
				expired,
				remaining: store.get_all().len(),
			})
			.build(),
		Err(err) => builder.failure(&err).build(),
	};
	let ok = envelope.ok;
	print_result(&envelope, format, |r| format!("deleted {} record(s), {} remaining", r.expired, r.remaining))?;
	anyhow::ensure!(ok, "cleanup failed");
	Ok(())
}
