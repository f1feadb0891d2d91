//! Worker-side export execution
//!
//! Runs inside the `export` subcommand. Reads the two transient files the
//! runner wrote, opens each integration's credentials with the device key,
//! runs the matching exporter, and leaves artifacts in the uploads directory
//! for the agent to ship.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tidewater_core::CredentialCipher;
use tidewater_domain::{AgentError, ExportType, IntegrationConfig, Result, WorkerAgentConfig};
use tracing::{debug, info};

use super::exporter::{ExportInput, ExporterRegistry};
use crate::errors::infra_err;
use crate::storage::fs::write_atomic;
use crate::storage::JsonStateStore;

/// Worker invocation as parsed from the command line.
#[derive(Debug, Clone)]
pub struct WorkerInvocation {
    pub integrations_file: PathBuf,
    pub agent_config_file: PathBuf,
    pub job_id: String,
    pub reprocess_historical: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub integrations: usize,
    pub artifacts: usize,
    pub markers_updated: usize,
}

pub struct ExportWorker {
    exporters: ExporterRegistry,
    cipher: Arc<dyn CredentialCipher>,
}

impl ExportWorker {
    pub fn new(exporters: ExporterRegistry, cipher: Arc<dyn CredentialCipher>) -> Self {
        Self { exporters, cipher }
    }

    /// Export every integration in order; the first failure fails the whole
    /// worker and leaves markers of earlier integrations in place.
    pub async fn run(&self, invocation: &WorkerInvocation) -> Result<WorkerSummary> {
        let integrations: Vec<IntegrationConfig> =
            read_json(&invocation.integrations_file, "integration list")?;
        let config: WorkerAgentConfig = read_json(&invocation.agent_config_file, "worker config")?;
        let state = JsonStateStore::new(&config.state_file);
        std::fs::create_dir_all(&config.uploads_dir)
            .map_err(|e| infra_err(e, format!("create {}", config.uploads_dir.display())))?;

        let mut summary = WorkerSummary::default();
        for integration in &integrations {
            let written = self
                .export_one(invocation, &config, &state, integration, &mut summary)
                .await
                .map_err(|e| e.with_context(format!("integration '{}'", integration.name)))?;
            info!(
                job_id = %invocation.job_id,
                integration = %integration.name,
                artifacts = written,
                "worker.integration.exported"
            );
            summary.integrations += 1;
        }
        Ok(summary)
    }

    async fn export_one(
        &self,
        invocation: &WorkerInvocation,
        config: &WorkerAgentConfig,
        state: &JsonStateStore,
        integration: &IntegrationConfig,
        summary: &mut WorkerSummary,
    ) -> Result<usize> {
        let exporter = self.exporters.get(&integration.name).ok_or_else(|| {
            AgentError::Config(format!("no exporter registered for '{}'", integration.name))
        })?;

        let credentials = match &integration.encrypted_auth {
            Some(sealed) => Some(self.open_credentials(sealed, config)?),
            None => None,
        };

        let since = match (&integration.stable_id, invocation.reprocess_historical) {
            (Some(stable_id), false) => state.get_blocking(stable_id)?.filter(|m| !m.is_empty()),
            _ => None,
        };
        let export_type =
            if since.is_some() { ExportType::Incremental } else { ExportType::Historical };
        debug!(integration = %integration.name, %export_type, "worker.integration.starting");

        let output = exporter
            .export(ExportInput {
                job_id: &invocation.job_id,
                integration,
                credentials,
                export_type,
                since,
            })
            .await?;

        let prefix = file_prefix(integration);
        for artifact in &output.artifacts {
            let name = Path::new(&artifact.file_name)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    let raw = &artifact.file_name;
                    AgentError::InvalidInput(format!("invalid artifact name {raw:?}"))
                })?;
            write_atomic(&config.uploads_dir.join(format!("{prefix}-{name}")), &artifact.contents)?;
        }
        summary.artifacts += output.artifacts.len();

        if let (Some(stable_id), Some(marker)) = (&integration.stable_id, &output.marker) {
            state.set(stable_id, marker)?;
            summary.markers_updated += 1;
        }
        Ok(output.artifacts.len())
    }

    fn open_credentials(&self, sealed: &str, config: &WorkerAgentConfig) -> Result<Value> {
        let plaintext = self.cipher.decrypt_text(sealed, &config.encryption_key)?;
        serde_json::from_str(&plaintext)
            .map_err(|_| AgentError::Decryption("credentials are not a JSON document".into()))
    }
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let raw =
        std::fs::read(path).map_err(|e| infra_err(e, format!("read {what} {}", path.display())))?;
    serde_json::from_slice(&raw)
        .map_err(|e| AgentError::Config(format!("invalid {what} {}: {e}", path.display())))
}

fn file_prefix(integration: &IntegrationConfig) -> String {
    integration
        .stable_id
        .as_deref()
        .unwrap_or(&integration.name)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
