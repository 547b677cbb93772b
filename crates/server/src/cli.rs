use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};
use quill::AutomationConfig;
use tracing::warn;

use crate::output::OutputFormat;

const HOUR_SECS: u64 = 3600;
const DAY_SECS: u64 = 24 * HOUR_SECS;

#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(about = "Headless-browser session backend for Substack sign-in and publishing")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Session store file (defaults to the user data directory)
	#[arg(long, global = true, env = "QUILL_STORE", value_name = "FILE")]
	pub store: Option<PathBuf>,

	/// Output format of the offline commands
	#[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Json)]
	pub format: OutputFormat,

	#[command(subcommand)]
	pub command: Commands,
}

impl Cli {
	pub fn store_path(&self) -> PathBuf {
		self.store.clone().unwrap_or_else(default_store_path)
	}
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run the HTTP API
	Serve(ServeArgs),

	/// List persisted session records
	Sessions,

	/// Delete persisted records older than the given age without starting browsers
	Cleanup {
		/// Maximum record age in days
		#[arg(long, default_value = "90", value_name = "DAYS")]
		max_age_days: u64,
	},
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
	/// Address to listen on
	#[arg(long, env = "QUILL_BIND", default_value = "127.0.0.1:8787")]
	pub bind: SocketAddr,

	/// HS256 secret for minted credentials
	#[arg(long, env = "QUILL_JWT_SECRET", hide_env_values = true)]
	pub jwt_secret: Option<String>,

	/// Chromium executable (probed when omitted)
	#[arg(long, env = "QUILL_CHROME", value_name = "PATH")]
	pub chrome: Option<PathBuf>,

	/// Show the browser windows
	#[arg(long, env = "QUILL_HEADFUL", value_parser = BoolishValueParser::new())]
	pub headful: bool,

	/// Launch Chromium with --no-sandbox (needed as root in containers)
	#[arg(long, env = "QUILL_NO_SANDBOX", value_parser = BoolishValueParser::new())]
	pub no_sandbox: bool,

	/// Navigation timeout in seconds
	#[arg(long, env = "QUILL_NAVIGATION_TIMEOUT", default_value = "30", value_name = "SECS")]
	pub navigation_timeout: u64,

	/// Default wait for an emailed sign-in link, in seconds
	#[arg(long, env = "QUILL_EMAIL_TIMEOUT", default_value = "300", value_name = "SECS")]
	pub email_timeout: u64,

	/// Seconds between cleanup sweeps
	#[arg(long, env = "QUILL_CLEANUP_INTERVAL", default_value = "3600", value_name = "SECS")]
	pub cleanup_interval: u64,

	/// Close browsers older than this many hours
	#[arg(long, env = "QUILL_ACTIVE_MAX_AGE", default_value = "168", value_name = "HOURS")]
	pub active_max_age: u64,

	/// Delete records older than this many days
	#[arg(long, env = "QUILL_PERSISTENT_MAX_AGE", default_value = "90", value_name = "DAYS")]
	pub persistent_max_age: u64,
}

impl ServeArgs {
	pub fn automation_config(&self) -> AutomationConfig {
		let mut config = AutomationConfig::default();
		match &self.jwt_secret {
			Some(secret) if !secret.is_empty() => config.credential.secret = secret.clone(),
			_ => warn!(target = "quill.server", "QUILL_JWT_SECRET not set; credentials are signed with the development secret"),
		}
		config.launch.executable = self.chrome.clone();
		config.launch.headless = !self.headful;
		config.launch.no_sandbox = self.no_sandbox;
		config.timeouts.navigation = Duration::from_secs(self.navigation_timeout);
		config.timeouts.email_verification = Duration::from_secs(self.email_timeout);
		config.timeouts.email_verification_max = config.timeouts.email_verification_max.max(config.timeouts.email_verification);
		config.cleanup.interval = Duration::from_secs(self.cleanup_interval);
		config.cleanup.active_max_age = Duration::from_secs(self.active_max_age.saturating_mul(HOUR_SECS));
		config.cleanup.persistent_max_age = days(self.persistent_max_age);
		config
	}
}

fn default_store_path() -> PathBuf {
	dirs::data_dir()
		.unwrap_or_else(|| PathBuf::from("."))
		.join("quill")
		.join("sessions.json")
}

pub(crate) fn days(n: u64) -> Duration {
	Duration::from_secs(n.saturating_mul(DAY_SECS))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn serve_defaults_match_the_automation_defaults() {
		let cli = Cli::try_parse_from(["quill", "serve"]).unwrap();
		let Commands::Serve(args) = cli.command else {
			panic!("expected serve");
		};
		assert_eq!(args.bind.to_string(), "127.0.0.1:8787");

		let config = args.automation_config();
		let defaults = AutomationConfig::default();
		assert!(config.launch.headless);
		assert_eq!(config.cleanup.active_max_age, defaults.cleanup.active_max_age);
		assert_eq!(config.cleanup.persistent_max_age, defaults.cleanup.persistent_max_age);
		assert_eq!(config.timeouts.email_verification, defaults.timeouts.email_verification);
	}

	#[test]
	fn serve_flags_override_config() {
		let cli = Cli::try_parse_from([
			"quill",
			"-vv",
			"serve",
			"--headful",
			"--jwt-secret",
			"s3cret",
			"--active-max-age",
			"2",
			"--chrome",
			"/opt/chromium",
		])
		.unwrap();
		assert_eq!(cli.verbose, 2);
		let Commands::Serve(args) = cli.command else {
			panic!("expected serve");
		};
		let config = args.automation_config();
		assert!(!config.launch.headless);
		assert_eq!(config.credential.secret, "s3cret");
		assert_eq!(config.cleanup.active_max_age, Duration::from_secs(2 * HOUR_SECS));
		assert_eq!(config.launch.executable, Some(PathBuf::from("/opt/chromium")));
	}

	#[test]
	fn huge_ages_saturate_instead_of_overflowing() {
		let max = u64::MAX.to_string();
		let cli = Cli::try_parse_from([
			"quill",
			"serve",
			"--active-max-age",
			max.as_str(),
			"--persistent-max-age",
			max.as_str(),
			"--email-timeout",
			"7200",
		])
		.unwrap();
		let Commands::Serve(args) = cli.command else {
			panic!("expected serve");
		};
		let config = args.automation_config();
		assert_eq!(config.cleanup.active_max_age, Duration::from_secs(u64::MAX));
		assert_eq!(config.cleanup.persistent_max_age, Duration::from_secs(u64::MAX));
		assert_eq!(config.timeouts.email_verification_max, Duration::from_secs(7200));
		assert_eq!(days(u64::MAX), Duration::from_secs(u64::MAX));
	}

	#[test]
	fn global_flags_parse_after_subcommand() {
		let cli = Cli::try_parse_from(["quill", "sessions", "-f", "text", "--store", "/tmp/s.json"]).unwrap();
		assert!(matches!(cli.command, Commands::Sessions));
		assert_eq!(cli.format, OutputFormat::Text);
		assert_eq!(cli.store_path(), PathBuf::from("/tmp/s.json"));
	}
}
