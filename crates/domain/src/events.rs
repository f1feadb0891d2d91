//! Event bus payloads exchanged with the backend
//!
//! Every payload type implements [`EventMessage`], which ties it to a stable
//! message-type name. Adapters encode an [`AgentEvent`] as `(type name, JSON
//! payload)` and decode it through an explicit registry keyed by that name,
//! so no global decoder state is involved.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{
    TOPIC_PROJECT_REQUEST, TOPIC_PROJECT_RESPONSE, TOPIC_REPO_REQUEST, TOPIC_REPO_RESPONSE,
    TOPIC_USER_REQUEST, TOPIC_USER_RESPONSE,
};
use crate::errors::Result;
use crate::impl_wire_enum;
use crate::types::{ExportState, IntegrationRef, IntegrationStatus, SystemType};

/// Message headers used for routing and correlation.
pub type Headers = BTreeMap<String, String>;

/// A payload type that can travel over the event bus.
pub trait EventMessage: Serialize + DeserializeOwned + Into<AgentEvent> + Send + 'static {
    /// Stable message-type name used as the registry key.
    const TYPE_NAME: &'static str;
}

macro_rules! agent_events {
    ($($variant:ident($payload:ident) => $name:expr),+ $(,)?) => {
        /// Tagged union of every payload the agent sends or receives.
        #[derive(Debug, Clone, PartialEq)]
        pub enum AgentEvent {
            $($variant($payload),)+
        }

        impl AgentEvent {
            /// Message-type name of the contained payload.
            pub fn type_name(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => $name,)+
                }
            }

            /// Encode the contained payload as JSON.
            pub fn to_payload(&self) -> Result<serde_json::Value> {
                match self {
                    $(Self::$variant(payload) => Ok(serde_json::to_value(payload)?),)+
                }
            }
        }

        $(
            impl From<$payload> for AgentEvent {
                fn from(payload: $payload) -> Self {
                    Self::$variant(payload)
                }
            }

            impl EventMessage for $payload {
                const TYPE_NAME: &'static str = $name;
            }
        )+
    };
}

agent_events! {
    EnrollRequest(EnrollRequest) => "agent.EnrollRequest",
    EnrollResponse(EnrollResponse) => "agent.EnrollResponse",
    ExportRequest(ExportRequest) => "agent.ExportRequest",
    ExportResponse(ExportResponse) => "agent.ExportResponse",
    IntegrationRequest(IntegrationRequest) => "agent.IntegrationRequest",
    IntegrationResponse(IntegrationResponse) => "agent.IntegrationResponse",
    ExportLog(ExportLog) => "agent.ExportLog",
    Lifecycle(Lifecycle) => "agent.Lifecycle",
    OnboardRequest(OnboardRequest) => "agent.OnboardRequest",
    OnboardResponse(OnboardResponse) => "agent.OnboardResponse",
}

/// First message of the enrollment handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollRequest {
    pub code: String,
    pub uuid: Uuid,
    pub system_id: String,
    pub request_date: DateTime<Utc>,
}

/// Backend answer binding the device to a customer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollResponse {
    pub uuid: Uuid,
    #[serde(rename = "apikey")]
    pub api_key: String,
    pub customer_id: String,
}

impl fmt::Debug for EnrollResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrollResponse")
            .field("uuid", &self.uuid)
            .field("api_key", &"[REDACTED]")
            .field("customer_id", &self.customer_id)
            .finish()
    }
}

/// Inbound export job request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub job_id: String,
    pub request_date: DateTime<Utc>,
    #[serde(default)]
    pub reprocess_historical: bool,
    #[serde(default)]
    pub integrations: Vec<IntegrationRef>,
    #[serde(default)]
    pub upload_url: Option<String>,
}

/// Outbound export progress, sent once when a job starts and once when it
/// completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportResponse {
    pub job_id: String,
    pub uuid: Uuid,
    pub customer_id: String,
    pub state: ExportState,
    pub success: bool,
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub size: i64,
    pub upload_url: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub integrations: Vec<IntegrationStatus>,
}

/// Credentials submitted for a new integration.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationAuthorization {
    pub ref_id: String,
    pub name: String,
    #[serde(default)]
    pub system_type: Option<SystemType>,
    /// Raw third-party credentials. Never logged, never persisted.
    pub authorization: serde_json::Value,
}

impl fmt::Debug for IntegrationAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegrationAuthorization")
            .field("ref_id", &self.ref_id)
            .field("name", &self.name)
            .field("system_type", &self.system_type)
            .field("authorization", &"[REDACTED]")
            .finish()
    }
}

/// Request to validate and seal credentials for an integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationRequest {
    pub request_id: String,
    pub integration: IntegrationAuthorization,
}

/// Answer to an [`IntegrationRequest`]; carries the sealed credentials on
/// success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationResponse {
    pub request_id: String,
    pub ref_id: String,
    pub ref_type: String,
    pub uuid: Uuid,
    pub success: bool,
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub message: Option<String>,
    pub authorization: Option<String>,
    pub event_date: DateTime<Utc>,
}

/// Batch of worker output lines for the remote per-job log collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportLog {
    pub job_id: String,
    pub uuid: Uuid,
    pub lines: Vec<String>,
}

/// Agent lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleKind {
    Start,
    Enabled,
    Ping,
    Stop,
}

impl_wire_enum!(LifecycleKind {
    Start => "START",
    Enabled => "ENABLED",
    Ping => "PING",
    Stop => "STOP",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifecycle {
    pub kind: LifecycleKind,
    pub uuid: Uuid,
    pub customer_id: String,
    pub success: bool,
    pub event_date: DateTime<Utc>,
}

/// Record families the backend samples while onboarding an integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OnboardKind {
    Users,
    Repos,
    Projects,
}

impl_wire_enum!(OnboardKind {
    Users => "USERS",
    Repos => "REPOS",
    Projects => "PROJECTS",
});

impl OnboardKind {
    pub const ALL: [OnboardKind; 3] = [Self::Users, Self::Repos, Self::Projects];

    /// Topic the backend sends requests of this kind on.
    pub fn request_topic(self) -> &'static str {
        match self {
            Self::Users => TOPIC_USER_REQUEST,
            Self::Repos => TOPIC_REPO_REQUEST,
            Self::Projects => TOPIC_PROJECT_REQUEST,
        }
    }

    pub fn response_topic(self) -> &'static str {
        match self {
            Self::Users => TOPIC_USER_RESPONSE,
            Self::Repos => TOPIC_REPO_RESPONSE,
            Self::Projects => TOPIC_PROJECT_RESPONSE,
        }
    }
}

/// Ask for sample records from an already authorized integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardRequest {
    pub request_id: String,
    pub kind: OnboardKind,
    #[serde(default)]
    pub ref_type: String,
    pub ref_id: String,
    pub integration: IntegrationRef,
}

/// Answer to an [`OnboardRequest`]; `records` is empty on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardResponse {
    pub request_id: String,
    pub kind: OnboardKind,
    pub ref_type: String,
    pub ref_id: String,
    pub integration_id: String,
    pub uuid: Uuid,
    pub customer_id: String,
    pub success: bool,
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub records: Vec<serde_json::Value>,
    pub event_date: DateTime<Utc>,
}
