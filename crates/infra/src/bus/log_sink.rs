//! Per-job remote log sink
//!
//! Worker output lines are batched and published as `ExportLog` events
//! tagged with the job id.

use std::sync::Arc;

use async_trait::async_trait;
use tidewater_core::{EventBus, JobLogSink, JobLogSinkProvider};
use tidewater_domain::constants::{HEADER_JOB_ID, TOPIC_EXPORT_LOG};
use tidewater_domain::events::ExportLog;
use tidewater_domain::{DeviceIdentity, ExportJob, Headers, Result};
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

pub struct BusLogSink {
    bus: Arc<dyn EventBus>,
    job_id: String,
    device_id: Uuid,
    headers: Headers,
    batch_size: usize,
    buffer: Mutex<Vec<String>>,
}

impl BusLogSink {
    pub fn new(
        bus: Arc<dyn EventBus>,
        identity: &DeviceIdentity,
        job_id: &str,
        batch_size: usize,
    ) -> Self {
        let mut headers = identity.headers();
        headers.insert(HEADER_JOB_ID.to_string(), job_id.to_string());
        Self {
            bus,
            job_id: job_id.to_string(),
            device_id: identity.device_id,
            headers,
            batch_size: batch_size.max(1),
            buffer: Mutex::new(Vec::new()),
        }
    }

    async fn publish(&self, lines: Vec<String>) -> Result<()> {
        let event = ExportLog { job_id: self.job_id.clone(), uuid: self.device_id, lines };
        self.bus.publish(TOPIC_EXPORT_LOG, event.into(), self.headers.clone()).await
    }
}

#[async_trait]
impl JobLogSink for BusLogSink {
    async fn write_line(&self, line: String) {
        let batch = {
            let mut buffer = self.buffer.lock().await;
            buffer.push(line);
            if buffer.len() < self.batch_size {
                return;
            }
            std::mem::take(&mut *buffer)
        };
        if let Err(err) = self.publish(batch).await {
            warn!(job_id = %self.job_id, error = %err, "export_log.publish_failed");
        }
    }

    async fn flush(&self) -> Result<()> {
        let batch = std::mem::take(&mut *self.buffer.lock().await);
        if batch.is_empty() {
            return Ok(());
        }
        self.publish(batch).await
    }
}

/// Hands each job its own [`BusLogSink`].
pub struct BusLogSinkProvider {
    bus: Arc<dyn EventBus>,
    identity: DeviceIdentity,
    batch_size: usize,
}

impl BusLogSinkProvider {
    pub fn new(bus: Arc<dyn EventBus>, identity: DeviceIdentity, batch_size: usize) -> Self {
        Self { bus, identity, batch_size }
    }
}

impl JobLogSinkProvider for BusLogSinkProvider {
    fn sink_for(&self, job: &ExportJob) -> Arc<dyn JobLogSink> {
        let bus = Arc::clone(&self.bus);
        Arc::new(BusLogSink::new(bus, &self.identity, &job.job_id, self.batch_size))
    }
}
