//! Worker process side of the export contract

pub mod executor;
pub mod exporter;

pub use executor::{ExportWorker, WorkerInvocation, WorkerSummary};
pub use exporter::{
    require_credential_fields, Artifact, ExportInput, ExportOutput, ExporterRegistry,
    IntegrationExporter, MockExporter,
};
