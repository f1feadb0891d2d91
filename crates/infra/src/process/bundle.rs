//! Transient worker configuration files

use std::path::{Path, PathBuf};

use tidewater_domain::{AgentError, IntegrationConfig, Result, WorkerAgentConfig};
use tracing::warn;
use uuid::Uuid;

use crate::errors::infra_err;
use crate::storage::fs::write_private;

/// The two JSON files handed to one worker process.
///
/// Both files are owner-only and are removed when the bundle is dropped, on
/// every exit path of the runner.
#[derive(Debug)]
pub struct TransientConfigBundle {
    integrations_file: PathBuf,
    agent_config_file: PathBuf,
}

impl TransientConfigBundle {
    pub fn write(
        temp_dir: &Path,
        job_id: &str,
        integrations: &[IntegrationConfig],
        agent_config: &WorkerAgentConfig,
    ) -> Result<Self> {
        std::fs::create_dir_all(temp_dir)
            .map_err(|e| infra_err(e, format!("create {}", temp_dir.display())))?;

        let stem = format!("{}-{}", file_safe(job_id), Uuid::new_v4().simple());
        let bundle = Self {
            integrations_file: temp_dir.join(format!("{stem}-integrations.json")),
            agent_config_file: temp_dir.join(format!("{stem}-agent.json")),
        };

        // From here on Drop cleans up whatever was written.
        let integrations = serde_json::to_vec(integrations)
            .map_err(|e| AgentError::Serialization(format!("integration list: {e}")))?;
        write_private(&bundle.integrations_file, &integrations)?;

        let agent_config = serde_json::to_vec(agent_config)
            .map_err(|e| AgentError::Serialization(format!("worker config: {e}")))?;
        write_private(&bundle.agent_config_file, &agent_config)?;

        Ok(bundle)
    }

    pub fn integrations_file(&self) -> &Path {
        &self.integrations_file
    }

    pub fn agent_config_file(&self) -> &Path {
        &self.agent_config_file
    }
}

impl Drop for TransientConfigBundle {
    fn drop(&mut self) {
        for path in [&self.integrations_file, &self.agent_config_file] {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "runner.bundle.cleanup_failed");
                }
            }
        }
    }
}

fn file_safe(job_id: &str) -> String {
    let cleaned: String = job_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(64)
        .collect();
    if cleaned.is_empty() {
        "job".to_string()
    } else {
        cleaned
    }
}
