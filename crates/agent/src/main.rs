//! Tidewater agent entry point

use std::process::ExitCode;

use clap::Parser;
use tidewater_agent::cli::Cli;
use tidewater_agent::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match tidewater_agent::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if logging::is_initialized() {
                tracing::error!(error = %format!("{err:#}"), "agent.exited_with_error");
            } else {
                #[allow(clippy::print_stderr)]
                {
                    eprintln!("tidewater: {err:#}");
                }
            }
            ExitCode::FAILURE
        }
    }
}
