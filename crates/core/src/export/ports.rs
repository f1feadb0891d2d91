//! Port interfaces for export execution
//!
//! These traits define the boundaries between the scheduler and the
//! infrastructure that persists markers, runs workers, and ships artifacts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tidewater_domain::{ExportJob, IntegrationConfig, Result};

/// Read side of the incremental state store.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Last-processed marker for an integration.
    ///
    /// A missing backing file reads as an empty store. A present value that
    /// is not a string is an `AgentError::StateStore` error.
    async fn get(&self, stable_id: &str) -> Result<Option<String>>;
}

/// Everything a worker process needs for one job.
#[derive(Clone)]
pub struct RunRequest {
    pub job_id: String,
    pub correlation_id: String,
    pub integrations: Vec<IntegrationConfig>,
    pub reprocess_historical: bool,
    pub log_level: String,
    /// Remote destination for the worker's output lines, if any
    pub log_sink: Option<Arc<dyn JobLogSink>>,
}

impl std::fmt::Debug for RunRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunRequest")
            .field("job_id", &self.job_id)
            .field("correlation_id", &self.correlation_id)
            .field("integrations", &self.integrations.len())
            .field("reprocess_historical", &self.reprocess_historical)
            .field("log_level", &self.log_level)
            .field("log_sink", &self.log_sink.is_some())
            .finish()
    }
}

/// Outcome of a successful worker run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub exit_code: i32,
    /// Files left in the uploads directory when the worker exited
    pub artifact_count: usize,
    pub duration: Duration,
}

impl RunReport {
    pub fn has_artifacts(&self) -> bool {
        self.exit_code == 0 && self.artifact_count > 0
    }
}

/// Launches one isolated worker per job.
#[async_trait]
pub trait IntegrationRunner: Send + Sync {
    /// Run the worker to completion.
    ///
    /// # Errors
    /// Returns `AgentError::Process` carrying the worker's exit status when
    /// it exits unsuccessfully or cannot be spawned.
    async fn run(&self, request: RunRequest) -> Result<RunReport>;
}

/// Result of shipping a job's artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    NoArtifacts,
    Uploaded { size_bytes: i64, url: String },
}

/// Owner of the uploads directory.
#[async_trait]
pub trait ArtifactUploader: Send + Sync {
    /// Remove whatever a previous job left behind
    async fn purge(&self) -> Result<()>;

    /// Ship every artifact to `target`
    async fn upload(&self, target: &str) -> Result<UploadOutcome>;
}

/// Per-job remote log destination.
#[async_trait]
pub trait JobLogSink: Send + Sync {
    /// Queue one output line; may publish a full batch
    async fn write_line(&self, line: String);

    /// Publish whatever is still buffered
    async fn flush(&self) -> Result<()>;
}

/// Creates a [`JobLogSink`] for each job.
pub trait JobLogSinkProvider: Send + Sync {
    fn sink_for(&self, job: &ExportJob) -> Arc<dyn JobLogSink>;
}
