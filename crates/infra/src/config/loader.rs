//! Settings loader
//!
//! Loads [`AgentSettings`] for the long-running agent.
//!
//! ## Loading Strategy
//! 1. Loads a `.env` file from the working directory if one exists
//! 2. Uses `<root>/agent.toml` or `<root>/agent.json` as the base, falling
//!    back to defaults when neither exists
//! 3. Applies environment variable overrides on top
//!
//! ## Environment Variables
//! - `TIDEWATER_LOG_LEVEL`: Log level handed to worker processes
//! - `TIDEWATER_HEARTBEAT_SECS`: Heartbeat interval in seconds
//! - `TIDEWATER_BACKEND_ENABLED`: Whether to subscribe to backend jobs
//! - `TIDEWATER_WORKER_PROGRAM`: Worker executable (defaults to self)
//! - `TIDEWATER_LOG_BATCH`: Remote log lines per published batch
//! - `TIDEWATER_TEST_MOCK`: Submit a mock export job at startup

use std::path::Path;

use tidewater_domain::{AgentError, AgentSettings, Result};

use crate::config::paths::AgentPaths;
use crate::errors::InfraError;

pub const ENV_LOG_LEVEL: &str = "TIDEWATER_LOG_LEVEL";
pub const ENV_HEARTBEAT_SECS: &str = "TIDEWATER_HEARTBEAT_SECS";
pub const ENV_BACKEND_ENABLED: &str = "TIDEWATER_BACKEND_ENABLED";
pub const ENV_WORKER_PROGRAM: &str = "TIDEWATER_WORKER_PROGRAM";
pub const ENV_LOG_BATCH: &str = "TIDEWATER_LOG_BATCH";
pub const ENV_TEST_MOCK: &str = "TIDEWATER_TEST_MOCK";

/// Load settings for the agent rooted at `paths`.
///
/// # Errors
/// Returns `AgentError::Config` if the settings file is malformed or an
/// environment override has an invalid value.
pub fn load(paths: &AgentPaths) -> Result<AgentSettings> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "settings.dotenv_loaded"),
        Err(err) if err.not_found() => {}
        Err(err) => tracing::warn!(error = %err, "settings.dotenv_invalid"),
    }

    let mut settings = match paths.settings_candidates().into_iter().find(|p| p.exists()) {
        Some(path) => {
            tracing::info!(path = %path.display(), "settings.file_loaded");
            load_from_file(&path)?
        }
        None => {
            tracing::debug!(root = %paths.root().display(), "settings.defaults");
            AgentSettings::default()
        }
    };

    apply_env_overrides(&mut settings)?;
    Ok(settings)
}

/// Load settings from a file. Format is detected by extension.
///
/// # Errors
/// Returns `AgentError::Config` if the file cannot be read or parsed.
pub fn load_from_file(path: &Path) -> Result<AgentSettings> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        AgentError::Config(format!("Failed to read settings file {}: {e}", path.display()))
    })?;
    parse_settings(&contents, path)
}

fn parse_settings(contents: &str, path: &Path) -> Result<AgentSettings> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| AgentError::from(InfraError::from(e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| AgentError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(AgentError::Config(format!("Unsupported settings format: {extension}"))),
    }
}

/// Apply `TIDEWATER_*` overrides on top of file or default values.
pub fn apply_env_overrides(settings: &mut AgentSettings) -> Result<()> {
    if let Some(level) = env_opt(ENV_LOG_LEVEL) {
        settings.log_level = level;
    }
    if let Some(raw) = env_opt(ENV_HEARTBEAT_SECS) {
        let secs = raw
            .parse::<u64>()
            .map_err(|e| AgentError::Config(format!("Invalid heartbeat interval: {e}")))?;
        if secs == 0 {
            return Err(AgentError::Config("Heartbeat interval must be positive".into()));
        }
        settings.heartbeat_interval_secs = secs;
    }
    settings.backend_enabled = env_bool(ENV_BACKEND_ENABLED, settings.backend_enabled);
    if let Some(program) = env_opt(ENV_WORKER_PROGRAM) {
        settings.worker_program = Some(program.into());
    }
    if let Some(raw) = env_opt(ENV_LOG_BATCH) {
        settings.log_batch_size = raw
            .parse::<usize>()
            .map_err(|e| AgentError::Config(format!("Invalid log batch size: {e}")))?
            .max(1);
    }
    // Any non-empty value enables the mock job.
    if env_opt(ENV_TEST_MOCK).is_some() {
        settings.mock_export_on_boot = true;
    }
    Ok(())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
