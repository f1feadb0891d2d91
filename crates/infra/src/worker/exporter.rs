//! Per-system exporters
//!
//! Exports run inside the worker process; credential checks and onboarding
//! samples run in the agent against the same registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tidewater_domain::constants::MOCK_INTEGRATION;
use tidewater_domain::events::OnboardKind;
use tidewater_domain::{AgentError, ExportType, IntegrationConfig, Result};

/// Rows the mock exporter serves for onboarding.
const MOCK_ONBOARD_USERS: usize = 10;

/// Everything one exporter invocation gets to see.
#[derive(Debug)]
pub struct ExportInput<'a> {
    pub job_id: &'a str,
    pub integration: &'a IntegrationConfig,
    /// Decrypted credentials; `None` for integrations configured without any
    pub credentials: Option<Value>,
    pub export_type: ExportType,
    /// Marker recorded by the previous successful run
    pub since: Option<String>,
}

/// A file the worker writes into the uploads directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub contents: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct ExportOutput {
    pub artifacts: Vec<Artifact>,
    /// New last-processed marker, stored only when the export succeeds
    pub marker: Option<String>,
}

/// Data-source specific export logic.
#[async_trait]
pub trait IntegrationExporter: Send + Sync {
    async fn export(&self, input: ExportInput<'_>) -> Result<ExportOutput>;

    /// Check submitted credentials; rejections are `AgentError::Validation`
    /// and must not echo credential values.
    async fn validate(&self, credentials: &Value) -> Result<()>;

    /// Sample records for onboarding screens.
    async fn onboard(&self, kind: OnboardKind, credentials: &Value) -> Result<Vec<Value>> {
        let _ = credentials;
        Err(AgentError::InvalidInput(format!("onboard export of {kind} is not supported")))
    }
}

/// Exporters keyed by integration name.
#[derive(Clone, Default)]
pub struct ExporterRegistry {
    exporters: HashMap<String, Arc<dyn IntegrationExporter>>,
}

impl ExporterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the exporters compiled into this binary.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(MOCK_INTEGRATION, Arc::new(MockExporter));
        registry
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        exporter: Arc<dyn IntegrationExporter>,
    ) -> &mut Self {
        self.exporters.insert(name.into(), exporter);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn IntegrationExporter>> {
        self.exporters.get(name).cloned()
    }

    /// Like [`ExporterRegistry::get`], failing with `InvalidInput` when no
    /// exporter is registered under `name`.
    pub fn require(&self, name: &str) -> Result<Arc<dyn IntegrationExporter>> {
        self.get(name)
            .ok_or_else(|| AgentError::InvalidInput(format!("no exporter registered for '{name}'")))
    }
}

/// Accept a non-empty JSON object whose fields all carry a value.
pub fn require_credential_fields(credentials: &Value) -> Result<()> {
    let Value::Object(fields) = credentials else {
        return Err(AgentError::Validation("authorization must be a JSON object".into()));
    };
    if fields.is_empty() {
        return Err(AgentError::Validation("authorization has no credentials".into()));
    }
    if let Some((key, _)) = fields.iter().find(|(_, value)| is_blank(value)) {
        return Err(AgentError::Validation(format!("credential field '{key}' is empty")));
    }
    Ok(())
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Emits a single summary document and a fixed user list; used for local
/// smoke runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockExporter;

#[async_trait]
impl IntegrationExporter for MockExporter {
    async fn export(&self, input: ExportInput<'_>) -> Result<ExportOutput> {
        let now = Utc::now().to_rfc3339();
        let document = json!({
            "job_id": input.job_id,
            "integration": input.integration.name,
            "stable_id": input.integration.stable_id,
            "export_type": input.export_type,
            "since": input.since,
            "config": input.integration.config,
            "generated_at": now,
        });
        Ok(ExportOutput {
            artifacts: vec![Artifact {
                file_name: "mock.json".to_string(),
                contents: serde_json::to_vec_pretty(&document)?,
            }],
            marker: Some(now),
        })
    }

    async fn validate(&self, credentials: &Value) -> Result<()> {
        require_credential_fields(credentials)
    }

    async fn onboard(&self, kind: OnboardKind, _credentials: &Value) -> Result<Vec<Value>> {
        match kind {
            OnboardKind::Users => Ok((0..MOCK_ONBOARD_USERS)
                .map(|i| json!({ "name": format!("User {i}") }))
                .collect()),
            other => {
                Err(AgentError::InvalidInput(format!("onboard export of {other} is not supported")))
            }
        }
    }
}
