//! Integration references and the merged worker configuration

use serde::{Deserialize, Serialize};

use crate::config::ExtraIntegration;
use crate::errors::{AgentError, Result};
use crate::impl_wire_enum;

/// Category of third-party system an integration connects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemType {
    Work,
    SourceCode,
    CodeQuality,
}

impl_wire_enum!(SystemType {
    Work => "WORK",
    SourceCode => "SOURCECODE",
    CodeQuality => "CODEQUALITY",
});

/// Whether an integration export is bounded by a stored marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportType {
    Historical,
    Incremental,
}

impl_wire_enum!(ExportType {
    Historical => "HISTORICAL",
    Incremental => "INCREMENTAL",
});

/// Integration as it arrives in an export request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationRef {
    pub stable_id: String,
    pub name: String,
    pub system_type: SystemType,
    /// Sealed credential token produced by this device's vault.
    pub encrypted_auth: String,
    #[serde(default)]
    pub exclusions: Vec<String>,
}

impl IntegrationRef {
    /// Reject integrations that cannot be handed to a worker.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AgentError::Config(format!(
                "integration {:?} has no name",
                self.stable_id
            )));
        }
        if self.stable_id.trim().is_empty() {
            return Err(AgentError::Config(format!(
                "integration '{}' has no stable id",
                self.name
            )));
        }
        if self.encrypted_auth.trim().is_empty() {
            return Err(AgentError::Config(format!(
                "integration '{}' has no authorization",
                self.name
            )));
        }
        Ok(())
    }
}

/// Per-integration status reported in export responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationStatus {
    pub integration_id: String,
    pub name: String,
    pub system_type: SystemType,
    /// Only populated on the completed event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_type: Option<ExportType>,
}

impl IntegrationStatus {
    pub fn pending(integration: &IntegrationRef) -> Self {
        Self {
            integration_id: integration.stable_id.clone(),
            name: integration.name.clone(),
            system_type: integration.system_type,
            export_type: None,
        }
    }

    pub fn classified(integration: &IntegrationRef, export_type: ExportType) -> Self {
        Self { export_type: Some(export_type), ..Self::pending(integration) }
    }
}

/// One entry of the merged integration list handed to the worker process.
///
/// Job integrations carry a stable id and sealed credentials; extra
/// integrations from the agent settings carry only a name and free-form
/// config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stable_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_type: Option<SystemType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_auth: Option<String>,
    #[serde(default)]
    pub exclusions: Vec<String>,
    #[serde(default)]
    pub config: serde_json::Value,
}

impl IntegrationConfig {
    pub fn from_ref(integration: &IntegrationRef) -> Result<Self> {
        integration.validate()?;
        Ok(Self {
            name: integration.name.clone(),
            stable_id: Some(integration.stable_id.clone()),
            system_type: Some(integration.system_type),
            encrypted_auth: Some(integration.encrypted_auth.clone()),
            exclusions: integration.exclusions.clone(),
            config: serde_json::Value::Null,
        })
    }

    pub fn from_extra(extra: &ExtraIntegration) -> Self {
        Self {
            name: extra.name.clone(),
            stable_id: None,
            system_type: None,
            encrypted_auth: None,
            exclusions: Vec::new(),
            config: extra.config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> IntegrationRef {
        IntegrationRef {
            stable_id: "repo1".into(),
            name: "github".into(),
            system_type: SystemType::SourceCode,
            encrypted_auth: "c2VhbGVk".into(),
            exclusions: vec!["archived".into()],
        }
    }

    #[test]
    fn validate_requires_identity_fields() {
        assert!(repo().validate().is_ok());

        let mut missing_id = repo();
        missing_id.stable_id = " ".into();
        let err = missing_id.validate().unwrap_err();
        assert_eq!(err.code(), "config_error");
        assert!(err.to_string().contains("github"));

        let mut missing_auth = repo();
        missing_auth.encrypted_auth.clear();
        assert!(missing_auth.validate().is_err());
    }

    #[test]
    fn system_type_wire_format() {
        let json = serde_json::to_value(repo()).unwrap();
        assert_eq!(json["system_type"], "SOURCECODE");
    }

    #[test]
    fn status_omits_export_type_until_classified() {
        let pending = serde_json::to_value(IntegrationStatus::pending(&repo())).unwrap();
        assert!(pending.get("export_type").is_none());

        let done = IntegrationStatus::classified(&repo(), ExportType::Incremental);
        assert_eq!(serde_json::to_value(done).unwrap()["export_type"], "INCREMENTAL");
    }

    #[test]
    fn config_from_extra_has_no_credentials() {
        let extra = ExtraIntegration {
            name: "mock".into(),
            config: serde_json::json!({"k1": "v1"}),
        };
        let conf = IntegrationConfig::from_extra(&extra);
        assert!(conf.stable_id.is_none());
        assert!(conf.encrypted_auth.is_none());
        assert_eq!(conf.config["k1"], "v1");
    }
}
