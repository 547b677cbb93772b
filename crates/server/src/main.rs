use clap::Parser;
use quill_server::cli::Cli;
use quill_server::{commands, logging};
use tracing::error;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = commands::dispatch(cli).await {
		error!(target = "quill.server", error = %err, "command failed");
		std::process::exit(1);
	}
}
