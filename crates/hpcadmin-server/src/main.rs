//! hpcadmin server binary.
//!
//! Parses the command line, initializes structured logging, and hands off to
//! [`hpcadmin_server::bootstrap::run`]. Any startup failure is logged and the
//! process exits with status 1.

use hpcadmin_server::bootstrap;
use hpcadmin_server::cli::Cli;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if cli.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_tracing(&cli);

    match bootstrap::run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "hpcadmin server exited with an error");
            ExitCode::FAILURE
        }
    }
}
