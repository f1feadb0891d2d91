//! Incremental state store backed by one JSON object
//!
//! `<root>/state/last_processed.json` maps integration stable ids to their
//! last-processed marker. The worker process is the only writer; the
//! scheduler only reads.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tidewater_core::StateStore;
use tidewater_domain::{AgentError, Result};

use crate::errors::infra_err;
use crate::storage::fs::write_atomic;

pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a new marker for `stable_id`, persisting atomically.
    pub fn set(&self, stable_id: &str, marker: &str) -> Result<()> {
        let mut entries = self.read_map()?;
        entries.insert(stable_id.to_string(), Value::String(marker.to_string()));
        let contents = serde_json::to_vec_pretty(&Value::Object(entries))?;
        write_atomic(&self.path, &contents)
    }

    /// Synchronous read used by the worker side
    pub fn get_blocking(&self, stable_id: &str) -> Result<Option<String>> {
        marker_from(&self.read_map()?, stable_id)
    }

    fn read_map(&self) -> Result<Map<String, Value>> {
        match std::fs::read(&self.path) {
            Ok(raw) => parse_map(&raw, &self.path),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(err) => Err(state_err(infra_err(err, format!("read {}", self.path.display())))),
        }
    }
}

fn parse_map(raw: &[u8], path: &Path) -> Result<Map<String, Value>> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice(raw) {
        Ok(Value::Object(entries)) => Ok(entries),
        Ok(_) => Err(AgentError::StateStore(format!("{} is not a JSON object", path.display()))),
        Err(e) => Err(AgentError::StateStore(format!("invalid JSON in {}: {e}", path.display()))),
    }
}

fn marker_from(entries: &Map<String, Value>, stable_id: &str) -> Result<Option<String>> {
    match entries.get(stable_id) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(marker)) => Ok(Some(marker.clone())),
        Some(other) => Err(AgentError::StateStore(format!(
            "value for {stable_id} is not a string: {}",
            json_kind(other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn state_err(err: AgentError) -> AgentError {
    match err {
        AgentError::StateStore(_) => err,
        other => AgentError::StateStore(other.to_string()),
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn get(&self, stable_id: &str) -> Result<Option<String>> {
        let entries = match tokio::fs::read(&self.path).await {
            Ok(raw) => parse_map(&raw, &self.path)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(state_err(infra_err(err, format!("read {}", self.path.display()))));
            }
        };
        marker_from(&entries, stable_id)
    }
}
