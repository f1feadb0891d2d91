//! Shared fixtures

use chrono::{TimeZone, Utc};
use tidewater_domain::{DeviceIdentity, EncryptionKey, ExportJob, IntegrationRef, SystemType};
use uuid::Uuid;

pub fn identity() -> DeviceIdentity {
    DeviceIdentity {
        api_key: "api-key".into(),
        customer_id: "cust-1".into(),
        channel: "stable".into(),
        device_id: Uuid::new_v4(),
        system_id: "system-1".into(),
        encryption_key: EncryptionKey::from_bytes([9; 32]),
    }
}

pub fn repo(stable_id: &str) -> IntegrationRef {
    IntegrationRef {
        stable_id: stable_id.into(),
        name: "github".into(),
        system_type: SystemType::SourceCode,
        encrypted_auth: "k9:{\"token\":\"t\"}".into(),
        exclusions: Vec::new(),
    }
}

pub fn job(job_id: &str, integrations: Vec<IntegrationRef>) -> ExportJob {
    ExportJob {
        job_id: job_id.into(),
        requested_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        reprocess_historical: false,
        integrations,
        upload_target: None,
        correlation_id: format!("corr-{job_id}"),
    }
}
