//! Single-flight export scheduler
//!
//! Jobs are submitted as `(job, done)` pairs over a bounded channel and
//! drained by one worker task, so at most one job executes at any instant
//! and jobs complete in submission order. Submission blocks while the queue
//! is full.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tidewater_domain::constants::TOPIC_EXPORT_RESPONSE;
use tidewater_domain::events::ExportResponse;
use tidewater_domain::{
    AgentError, DeviceIdentity, ExportJob, ExportState, ExtraIntegration, IntegrationConfig,
    IntegrationStatus, JobResult, Result,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::bus::EventBus;
use crate::export::classification::classify;
use crate::export::error::{SchedulerError, SchedulerResult};
use crate::export::ports::{
    ArtifactUploader, IntegrationRunner, JobLogSinkProvider, RunRequest, StateStore, UploadOutcome,
};

type QueuedJob = (ExportJob, oneshot::Sender<JobResult>);

/// Type alias for task handle to avoid complexity warnings
type TaskHandle = Arc<tokio::sync::Mutex<Option<JoinHandle<()>>>>;

/// Collaborators shared by every job.
pub struct ExportContext {
    pub bus: Arc<dyn EventBus>,
    pub identity: DeviceIdentity,
    pub state: Arc<dyn StateStore>,
    pub runner: Arc<dyn IntegrationRunner>,
    pub uploader: Arc<dyn ArtifactUploader>,
    pub log_sinks: Option<Arc<dyn JobLogSinkProvider>>,
    /// Locally configured integrations appended to every job
    pub extra_integrations: Vec<ExtraIntegration>,
    pub log_level: String,
}

/// Cloneable submission side of the scheduler queue.
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<QueuedJob>,
}

impl SchedulerHandle {
    /// Queue a job, waiting for room if another job is already queued.
    ///
    /// The returned receiver resolves with the job's result once its
    /// completed event has been emitted.
    pub async fn submit(&self, job: ExportJob) -> SchedulerResult<oneshot::Receiver<JobResult>> {
        let (done_tx, done_rx) = oneshot::channel();
        self.sender.send((job, done_tx)).await.map_err(|_| SchedulerError::QueueClosed)?;
        Ok(done_rx)
    }

    /// Queue a job and wait for its result
    pub async fn run(&self, job: ExportJob) -> SchedulerResult<JobResult> {
        self.submit(job).await?.await.map_err(|_| SchedulerError::QueueClosed)
    }
}

/// Export scheduler with a single worker task.
pub struct ExportScheduler {
    context: Arc<ExportContext>,
    running: Arc<Mutex<bool>>,
    sender: Mutex<Option<mpsc::Sender<QueuedJob>>>,
    cancellation_token: Mutex<CancellationToken>,
    task_handle: TaskHandle,
}

impl ExportScheduler {
    pub fn new(context: ExportContext) -> Self {
        Self {
            context: Arc::new(context),
            running: Arc::new(Mutex::new(false)),
            sender: Mutex::new(None),
            cancellation_token: Mutex::new(CancellationToken::new()),
            task_handle: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    /// Spawn the worker task.
    ///
    /// # Errors
    ///
    /// Returns error if the worker is already started
    #[instrument(skip(self))]
    pub async fn start(&self) -> SchedulerResult<SchedulerHandle> {
        let mut task = self.task_handle.lock().await;
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Err(SchedulerError::AlreadyRunning);
        }

        let (sender, receiver) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        *self.cancellation_token.lock() = cancel.clone();
        *self.sender.lock() = Some(sender.clone());

        let context = Arc::clone(&self.context);
        let running = Arc::clone(&self.running);
        *task = Some(tokio::spawn(async move {
            Self::worker_loop(context, running, receiver, cancel).await;
        }));

        info!("scheduler.started");
        Ok(SchedulerHandle { sender })
    }

    /// Submission handle for a started scheduler
    pub fn handle(&self) -> SchedulerResult<SchedulerHandle> {
        self.sender
            .lock()
            .as_ref()
            .map(|sender| SchedulerHandle { sender: sender.clone() })
            .ok_or(SchedulerError::NotRunning)
    }

    /// Whether a job is executing right now
    pub fn is_running(&self) -> bool {
        *self.running.lock()
    }

    /// Stop accepting jobs and wait for the worker task.
    ///
    /// A job already executing runs to completion; queued jobs are dropped
    /// and their `done` receivers resolve with an error.
    ///
    /// # Errors
    ///
    /// Returns error if the scheduler was never started
    #[instrument(skip(self))]
    pub async fn stop(&self) -> SchedulerResult<()> {
        let Some(handle) = self.task_handle.lock().await.take() else {
            return Err(SchedulerError::NotRunning);
        };
        self.sender.lock().take();
        self.cancellation_token.lock().cancel();

        handle.await.map_err(|err| SchedulerError::TaskJoinFailed(err.to_string()))?;
        info!("scheduler.stopped");
        Ok(())
    }

    async fn worker_loop(
        context: Arc<ExportContext>,
        running: Arc<Mutex<bool>>,
        mut receiver: mpsc::Receiver<QueuedJob>,
        cancel: CancellationToken,
    ) {
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!("scheduler.worker.cancelled");
                    break;
                }
                next = receiver.recv() => next,
            };
            let Some((job, done)) = next else {
                debug!("scheduler.worker.queue_closed");
                break;
            };

            *running.lock() = true;
            let result = execute(&context, &job).await;
            *running.lock() = false;

            if done.send(result).is_err() {
                debug!(job_id = %job.job_id, "scheduler.job.done_receiver_dropped");
            }
        }
    }
}

/// Run one job end to end and emit its starting and completed events.
///
/// Never fails: every error is folded into the returned [`JobResult`].
async fn execute(context: &ExportContext, job: &ExportJob) -> JobResult {
    let started_at = Utc::now();
    let pending: Vec<IntegrationStatus> =
        job.integrations.iter().map(IntegrationStatus::pending).collect();
    info!(job_id = %job.job_id, integrations = job.integrations.len(), "scheduler.job.started");

    let starting = JobResult::succeeded(0, None, pending.clone());
    publish_response(context, job, ExportState::Starting, started_at, None, &starting).await;

    let mut statuses = pending;
    let result = match process(context, job, &mut statuses).await {
        Ok((size_bytes, upload_url)) => JobResult::succeeded(size_bytes, upload_url, statuses),
        Err(err) => {
            error!(job_id = %job.job_id, error = %err, code = err.code(), "scheduler.job.failed");
            JobResult::failed(&err, statuses)
        }
    };

    let finished_at = Some(Utc::now());
    publish_response(context, job, ExportState::Completed, started_at, finished_at, &result).await;
    info!(
        job_id = %job.job_id,
        success = result.success,
        size_bytes = result.size_bytes,
        "scheduler.job.completed"
    );
    result
}

async fn process(
    context: &ExportContext,
    job: &ExportJob,
    statuses: &mut Vec<IntegrationStatus>,
) -> Result<(i64, Option<String>)> {
    if job.integrations.is_empty() {
        return Err(AgentError::Config(format!("job {} has no integrations", job.job_id)));
    }

    context.uploader.purge().await.map_err(|err| err.with_context("purge uploads"))?;

    *statuses =
        classify(context.state.as_ref(), &job.integrations, job.reprocess_historical).await?;

    let mut integrations = job
        .integrations
        .iter()
        .map(IntegrationConfig::from_ref)
        .collect::<Result<Vec<_>>>()?;
    integrations.extend(context.extra_integrations.iter().map(IntegrationConfig::from_extra));

    let log_sink = context.log_sinks.as_ref().map(|provider| provider.sink_for(job));
    let request = RunRequest {
        job_id: job.job_id.clone(),
        correlation_id: job.correlation_id.clone(),
        integrations,
        reprocess_historical: job.reprocess_historical,
        log_level: context.log_level.clone(),
        log_sink,
    };
    let report = context.runner.run(request).await?;
    info!(
        job_id = %job.job_id,
        exit_code = report.exit_code,
        artifacts = report.artifact_count,
        duration_ms = u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
        "scheduler.job.worker_finished"
    );

    if !report.has_artifacts() {
        debug!(job_id = %job.job_id, "scheduler.job.no_artifacts");
        return Ok((0, None));
    }
    let Some(target) = job.upload_target.as_deref() else {
        warn!(
            job_id = %job.job_id,
            artifacts = report.artifact_count,
            "scheduler.job.no_upload_target"
        );
        return Ok((0, None));
    };

    let outcome =
        context.uploader.upload(target).await.map_err(|err| err.with_context("upload artifacts"))?;
    match outcome {
        UploadOutcome::NoArtifacts => Ok((0, None)),
        UploadOutcome::Uploaded { size_bytes, url } => Ok((size_bytes, Some(url))),
    }
}

async fn publish_response(
    context: &ExportContext,
    job: &ExportJob,
    state: ExportState,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    result: &JobResult,
) {
    let response = ExportResponse {
        job_id: job.job_id.clone(),
        uuid: context.identity.device_id,
        customer_id: context.identity.customer_id.clone(),
        state,
        success: result.success,
        error: result.error.clone(),
        error_code: result.error_code.clone(),
        size: result.size_bytes,
        upload_url: result.upload_url.clone(),
        start_date,
        end_date,
        integrations: result.integrations.clone(),
    };
    if let Err(err) = context
        .bus
        .publish(TOPIC_EXPORT_RESPONSE, response.into(), context.identity.headers())
        .await
    {
        warn!(job_id = %job.job_id, state = %state, error = %err, "scheduler.job.publish_failed");
    }
}
