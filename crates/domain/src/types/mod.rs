//! Domain types and models

pub mod identity;
pub mod integration;
pub mod job;

pub use identity::{group_id_for, DeviceIdentity, EncryptionKey};
pub use integration::{ExportType, IntegrationConfig, IntegrationRef, IntegrationStatus, SystemType};
pub use job::{ExportJob, ExportState, JobResult};
