//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use tidewater_domain::AgentError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub AgentError);

impl From<InfraError> for AgentError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<AgentError> for InfraError {
    fn from(value: AgentError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoAgentError {
    fn into_agent(self) -> AgentError;
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → AgentError */
/* -------------------------------------------------------------------------- */

impl IntoAgentError for std::io::Error {
    fn into_agent(self) -> AgentError {
        use std::io::ErrorKind;

        match self.kind() {
            ErrorKind::NotFound => AgentError::Io(format!("not found: {self}")),
            ErrorKind::PermissionDenied => AgentError::Io(format!("permission denied: {self}")),
            ErrorKind::InvalidData => AgentError::Serialization(self.to_string()),
            _ => AgentError::Io(self.to_string()),
        }
    }
}

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        InfraError(value.into_agent())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json / toml → AgentError */
/* -------------------------------------------------------------------------- */

impl IntoAgentError for serde_json::Error {
    fn into_agent(self) -> AgentError {
        if self.is_io() {
            return AgentError::Io(self.to_string());
        }
        AgentError::Serialization(format!("invalid JSON at line {}: {self}", self.line()))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(value.into_agent())
    }
}

impl IntoAgentError for toml::de::Error {
    fn into_agent(self) -> AgentError {
        AgentError::Config(format!("invalid TOML format: {}", self.message()))
    }
}

impl From<toml::de::Error> for InfraError {
    fn from(value: toml::de::Error) -> Self {
        InfraError(value.into_agent())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → AgentError */
/* -------------------------------------------------------------------------- */

impl IntoAgentError for HttpError {
    fn into_agent(self) -> AgentError {
        if self.is_timeout() {
            return AgentError::Upload("HTTP request timed out".into());
        }

        if self.is_connect() {
            return AgentError::Upload("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                400..=499 => AgentError::InvalidInput(message),
                _ => AgentError::Upload(message),
            };
        }

        AgentError::Upload(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_agent())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
