//! Scripted runner, uploader, and log sink fakes

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tidewater_core::{
    ArtifactUploader, IntegrationRunner, JobLogSink, JobLogSinkProvider, RunReport, RunRequest,
    UploadOutcome,
};
use tidewater_domain::{AgentError, ExportJob, Result};

/// Records every request and tracks how many runs overlap.
#[derive(Default)]
pub struct FakeRunner {
    delay: Duration,
    artifacts: usize,
    failing_jobs: Mutex<Vec<String>>,
    requests: Mutex<Vec<RunRequest>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_artifacts(mut self, artifacts: usize) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Make the worker for `job_id` exit with status 3
    pub fn failing(self, job_id: &str) -> Self {
        self.failing_jobs.lock().push(job_id.to_string());
        self
    }

    pub fn requests(&self) -> Vec<RunRequest> {
        self.requests.lock().clone()
    }

    pub fn job_order(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.job_id.clone()).collect()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IntegrationRunner for FakeRunner {
    async fn run(&self, request: RunRequest) -> Result<RunReport> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        let job_id = request.job_id.clone();
        let sink = request.log_sink.clone();
        self.requests.lock().push(request);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(sink) = sink {
            sink.write_line(format!("exporting {job_id}")).await;
            sink.flush().await?;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.failing_jobs.lock().contains(&job_id) {
            let message = format!("worker for job {job_id} exited with status 3");
            return Err(AgentError::Process(message));
        }
        Ok(RunReport { exit_code: 0, artifact_count: self.artifacts, duration: self.delay })
    }
}

#[derive(Default)]
pub struct FakeUploader {
    purges: AtomicUsize,
    targets: Mutex<Vec<String>>,
    size_bytes: i64,
}

impl FakeUploader {
    pub fn new(size_bytes: i64) -> Self {
        Self { size_bytes, ..Self::default() }
    }

    pub fn purges(&self) -> usize {
        self.purges.load(Ordering::SeqCst)
    }

    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().clone()
    }
}

#[async_trait]
impl ArtifactUploader for FakeUploader {
    async fn purge(&self) -> Result<()> {
        self.purges.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn upload(&self, target: &str) -> Result<UploadOutcome> {
        self.targets.lock().push(target.to_string());
        if self.size_bytes == 0 {
            return Ok(UploadOutcome::NoArtifacts);
        }
        Ok(UploadOutcome::Uploaded { size_bytes: self.size_bytes, url: target.to_string() })
    }
}

/// Collects log lines per job
#[derive(Default)]
pub struct RecordingLogs {
    lines: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingLogs {
    pub fn lines(&self) -> Vec<(String, String)> {
        self.lines.lock().clone()
    }
}

struct RecordingSink {
    job_id: String,
    lines: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl JobLogSink for RecordingSink {
    async fn write_line(&self, line: String) {
        self.lines.lock().push((self.job_id.clone(), line));
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

impl JobLogSinkProvider for RecordingLogs {
    fn sink_for(&self, job: &ExportJob) -> Arc<dyn JobLogSink> {
        Arc::new(RecordingSink { job_id: job.job_id.clone(), lines: Arc::clone(&self.lines) })
    }
}
