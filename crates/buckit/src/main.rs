//! buckit CLI: fetch uploaded payloads and persist them into object storage.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use buckit::{CliArgs, Config, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = CliArgs::parse();
    info!("Loading config from {}", args.config.display());

    let config = match Config::from_file(&args.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    match buckit::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("buckit stopped: {e}");
            ExitCode::FAILURE
        }
    }
}
