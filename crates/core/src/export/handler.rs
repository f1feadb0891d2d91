//! Export-request subscription handler

use async_trait::async_trait;
use tidewater_domain::{AgentEvent, ExportJob, Result};
use tracing::{debug, info};

use crate::bus::{Envelope, EventHandler};
use crate::export::scheduler::SchedulerHandle;

/// Turns export-request events into queued jobs.
///
/// Blocks bus delivery while the scheduler queue is full.
pub struct ExportRequestHandler {
    scheduler: SchedulerHandle,
}

impl ExportRequestHandler {
    pub fn new(scheduler: SchedulerHandle) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl EventHandler for ExportRequestHandler {
    async fn handle(&self, envelope: Envelope) -> Result<()> {
        let AgentEvent::ExportRequest(request) = envelope.event else {
            debug!(topic = %envelope.topic, "export.request.ignored");
            return Ok(());
        };

        let job = ExportJob::from_request(request, envelope.message_id);
        info!(
            job_id = %job.job_id,
            integrations = job.integrations.len(),
            "export.request.received"
        );
        self.scheduler.submit(job).await?;
        Ok(())
    }
}
