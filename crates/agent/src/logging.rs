//! Tracing subscriber setup
//!
//! Everything logs to stderr synchronously, so a worker's last lines reach
//! the agent before the process exits.

use anyhow::anyhow;
use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Install the global subscriber. `RUST_LOG` overrides `level`.
pub fn init(level: &str, format: LogFormat) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            EnvFilter::try_new(level).map_err(|e| anyhow!("invalid log level {level:?}: {e}"))?
        }
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };
    installed.map_err(|e| anyhow!("failed to initialize logging: {e}"))
}

/// True once [`init`] (or anything else) installed a global subscriber.
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}
