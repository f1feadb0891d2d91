//! Credential checks dispatched to exporters
//!
//! Each exporter knows what a usable credential set looks like for its
//! system; this adapter routes a submission to the exporter registered
//! under the integration's name.

use async_trait::async_trait;
use tidewater_core::CredentialValidator;
use tidewater_domain::events::IntegrationAuthorization;
use tidewater_domain::{AgentError, Result};
use tracing::debug;

use crate::worker::ExporterRegistry;

#[derive(Clone)]
pub struct ExporterCredentialValidator {
    exporters: ExporterRegistry,
}

impl ExporterCredentialValidator {
    pub fn new(exporters: ExporterRegistry) -> Self {
        Self { exporters }
    }
}

#[async_trait]
impl CredentialValidator for ExporterCredentialValidator {
    async fn validate(&self, integration: &IntegrationAuthorization) -> Result<()> {
        if integration.name.trim().is_empty() {
            return Err(AgentError::Validation("integration name is empty".into()));
        }
        let exporter = self.exporters.get(&integration.name).ok_or_else(|| {
            AgentError::Validation(format!("no exporter registered for '{}'", integration.name))
        })?;

        debug!(integration = %integration.name, "validator.dispatch");
        exporter.validate(&integration.authorization).await
    }
}
