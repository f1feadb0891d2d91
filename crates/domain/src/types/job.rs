//! Export jobs and their results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AgentError;
use crate::events::ExportRequest;
use crate::impl_wire_enum;
use crate::types::integration::{IntegrationRef, IntegrationStatus};

/// One export request instance, consumed exactly once by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportJob {
    pub job_id: String,
    pub requested_at: DateTime<Utc>,
    pub reprocess_historical: bool,
    pub integrations: Vec<IntegrationRef>,
    /// Destination for finished artifacts. Jobs without one skip upload.
    pub upload_target: Option<String>,
    /// Message id of the inbound event, used to correlate worker logs.
    pub correlation_id: String,
}

impl ExportJob {
    pub fn from_request(request: ExportRequest, correlation_id: impl Into<String>) -> Self {
        Self {
            job_id: request.job_id,
            requested_at: request.request_date,
            reprocess_historical: request.reprocess_historical,
            integrations: request.integrations,
            upload_target: request.upload_url,
            correlation_id: correlation_id.into(),
        }
    }
}

/// Lifecycle phase carried by export-response events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Starting,
    Completed,
}

impl_wire_enum!(ExportState {
    Starting => "STARTING",
    Completed => "COMPLETED",
});

/// Outcome of one job as reported in the completed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub success: bool,
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub size_bytes: i64,
    pub upload_url: Option<String>,
    pub integrations: Vec<IntegrationStatus>,
}

impl JobResult {
    pub fn succeeded(
        size_bytes: i64,
        upload_url: Option<String>,
        integrations: Vec<IntegrationStatus>,
    ) -> Self {
        Self { success: true, error: None, error_code: None, size_bytes, upload_url, integrations }
    }

    pub fn failed(err: &AgentError, integrations: Vec<IntegrationStatus>) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            error_code: Some(err.code().to_string()),
            size_bytes: 0,
            upload_url: None,
            integrations,
        }
    }
}
