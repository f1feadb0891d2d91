//! Agent settings and the worker hand-off document

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{DEFAULT_HEARTBEAT_SECS, DEFAULT_LOG_BATCH_SIZE, DEFAULT_LOG_LEVEL};
use crate::types::{DeviceIdentity, EncryptionKey};

/// Integration configured locally rather than sent with a job.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraIntegration {
    pub name: String,
    /// Holds credentials; never rendered by `Debug`.
    #[serde(default)]
    pub config: serde_json::Value,
}

impl fmt::Debug for ExtraIntegration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtraIntegration")
            .field("name", &self.name)
            .field("config", &"[REDACTED]")
            .finish()
    }
}

/// Runtime settings for the long-running agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub log_level: String,
    pub heartbeat_interval_secs: u64,
    /// When false the agent stays enrolled but does not subscribe to jobs.
    pub backend_enabled: bool,
    /// Program spawned for each job. Defaults to the running executable.
    pub worker_program: Option<PathBuf>,
    pub log_batch_size: usize,
    /// Submit one job for the built-in mock exporter at startup.
    pub mock_export_on_boot: bool,
    pub extra_integrations: Vec<ExtraIntegration>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_SECS,
            backend_enabled: true,
            worker_program: None,
            log_batch_size: DEFAULT_LOG_BATCH_SIZE,
            mock_export_on_boot: false,
            extra_integrations: Vec::new(),
        }
    }
}

/// Agent-wide configuration written to the worker's agent-config file.
///
/// Carries the device key: the file holding it is created with owner-only
/// permissions and removed once the worker exits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerAgentConfig {
    pub device_id: Uuid,
    pub customer_id: String,
    pub channel: String,
    pub encryption_key: EncryptionKey,
    pub uploads_dir: PathBuf,
    pub state_file: PathBuf,
}

impl WorkerAgentConfig {
    pub fn for_device(
        identity: &DeviceIdentity,
        uploads_dir: PathBuf,
        state_file: PathBuf,
    ) -> Self {
        Self {
            device_id: identity.device_id,
            customer_id: identity.customer_id.clone(),
            channel: identity.channel.clone(),
            encryption_key: identity.encryption_key.clone(),
            uploads_dir,
            state_file,
        }
    }
}
