//! # Tidewater Agent
//!
//! Command-line front end: argument parsing, logging setup, dependency
//! wiring, and the `enroll`, `run`, and `export` commands.

pub mod cli;
pub mod commands;
pub mod context;
pub mod logging;

pub use context::AgentContext;

use anyhow::Context;
use tidewater_domain::constants::DEFAULT_LOG_LEVEL;
use tidewater_infra::{config, AgentPaths};

use crate::cli::{Cli, Command};

/// Execute the parsed command line.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let Cli { root, log_level, log_format, local_backend, command } = cli;

    // Worker processes get their configuration from the transient files
    // only; agent settings are not consulted.
    if let Command::Export(args) = command {
        logging::init(log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL), log_format)?;
        return commands::export::execute(args).await;
    }

    let paths = AgentPaths::new(match root {
        Some(root) => root,
        None => AgentPaths::default_root()?,
    });
    let settings = config::load(&paths).context("failed to load agent settings")?;
    logging::init(log_level.as_deref().unwrap_or(&settings.log_level), log_format)?;
    tracing::debug!(
        root = %paths.root().display(),
        ?settings,
        local_backend,
        "agent.settings.loaded"
    );

    let context = AgentContext::new(paths, settings)?;
    match command {
        Command::Enroll(args) => commands::enroll::execute(&context, args, local_backend).await,
        Command::Run => commands::run::execute(&context, local_backend).await,
        Command::Export(args) => commands::export::execute(args).await,
    }
}
