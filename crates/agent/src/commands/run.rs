//! `tidewater run`
//!
//! Startup order: instance lock, identity, lifecycle `Start`, heartbeat,
//! scheduler, lifecycle `Enabled`, backend subscriptions, optional mock job.
//! Shutdown on ctrl-c reverses it and publishes `Stop`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tidewater_core::{
    publish_lifecycle, CredentialCipher, EventHandler, ExportRequestHandler, ExportScheduler,
    Heartbeat, SchedulerHandle, Subscription, SubscriptionSpec,
};
use tidewater_domain::constants::{
    MOCK_INTEGRATION, TOPIC_EXPORT_REQUEST, TOPIC_INTEGRATION_REQUEST,
};
use tidewater_domain::events::{LifecycleKind, OnboardKind};
use tidewater_domain::{DeviceIdentity, ExportJob, IntegrationRef, SystemType};
use tidewater_infra::{InstanceLock, LocalBackend};
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::AgentContext;

pub async fn execute(context: &AgentContext, local_backend: bool) -> anyhow::Result<()> {
    let _lock = InstanceLock::acquire(context.paths.pid_file())?;
    let identity = context.identity_store.require().await?;
    let backend = if local_backend {
        Some(LocalBackend::attach(Arc::clone(&context.bus)).await?)
    } else {
        warn!("agent.backend.unconfigured");
        None
    };

    publish_lifecycle(context.bus.as_ref(), &identity, LifecycleKind::Start).await?;

    let mut heartbeat = Heartbeat::new(
        Arc::clone(&context.bus),
        identity.clone(),
        Duration::from_secs(context.settings.heartbeat_interval_secs),
    );
    heartbeat.start().await?;

    let scheduler = ExportScheduler::new(context.export_context(&identity)?);
    let handle = scheduler.start().await?;
    publish_lifecycle(context.bus.as_ref(), &identity, LifecycleKind::Enabled).await?;

    let subscriptions = if context.settings.backend_enabled {
        subscribe_backend(context, &identity, handle.clone()).await?
    } else {
        info!("agent.backend.disabled");
        Vec::new()
    };

    if context.settings.mock_export_on_boot {
        let job = mock_job(context.cipher.as_ref(), &identity)?;
        submit_and_report(&handle, job).await?;
    }

    info!(device_id = %identity.device_id, "agent.running");
    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("agent.shutdown.requested");

    for subscription in &subscriptions {
        if let Err(err) = subscription.close().await {
            warn!(error = %err, "agent.subscription.close_failed");
        }
    }
    drop(handle);
    scheduler.stop().await?;
    heartbeat.stop().await?;
    let stopped = publish_lifecycle(context.bus.as_ref(), &identity, LifecycleKind::Stop).await;
    if let Err(err) = stopped {
        warn!(error = %err, "agent.lifecycle.stop_failed");
    }
    if let Some(backend) = backend {
        backend.detach().await?;
    }

    info!("agent.stopped");
    Ok(())
}

async fn subscribe_backend(
    context: &AgentContext,
    identity: &DeviceIdentity,
    scheduler: SchedulerHandle,
) -> anyhow::Result<Vec<Box<dyn Subscription>>> {
    let integrations = context
        .bus
        .subscribe(
            SubscriptionSpec::new(
                TOPIC_INTEGRATION_REQUEST,
                identity.group_id(),
                identity.headers(),
            ),
            Arc::new(context.integration_handler(identity)),
        )
        .await?;
    let exports = context
        .bus
        .subscribe(
            SubscriptionSpec::new(TOPIC_EXPORT_REQUEST, identity.group_id(), identity.headers()),
            Arc::new(ExportRequestHandler::new(scheduler)),
        )
        .await?;

    let mut subscriptions = vec![integrations, exports];
    let onboarding: Arc<dyn EventHandler> = Arc::new(context.onboard_handler(identity));
    for kind in OnboardKind::ALL {
        let spec =
            SubscriptionSpec::new(kind.request_topic(), identity.group_id(), identity.headers());
        subscriptions.push(context.bus.subscribe(spec, Arc::clone(&onboarding)).await?);
    }
    for subscription in &subscriptions {
        subscription.wait_ready().await?;
    }
    info!(group_id = %identity.group_id(), "agent.backend.subscribed");
    Ok(subscriptions)
}

/// Historical job over the built-in `mock` exporter.
pub fn mock_job(
    cipher: &dyn CredentialCipher,
    identity: &DeviceIdentity,
) -> anyhow::Result<ExportJob> {
    let auth = cipher.encrypt_text(r#"{"k1":"v1"}"#, &identity.encryption_key)?;
    Ok(ExportJob {
        job_id: format!("mock-{}", Uuid::new_v4().simple()),
        requested_at: Utc::now(),
        reprocess_historical: true,
        integrations: vec![IntegrationRef {
            stable_id: MOCK_INTEGRATION.to_string(),
            name: MOCK_INTEGRATION.to_string(),
            system_type: SystemType::Work,
            encrypted_auth: auth,
            exclusions: Vec::new(),
        }],
        upload_target: None,
        correlation_id: Uuid::now_v7().to_string(),
    })
}

async fn submit_and_report(scheduler: &SchedulerHandle, job: ExportJob) -> anyhow::Result<()> {
    let job_id = job.job_id.clone();
    let done = scheduler.submit(job).await?;
    info!(%job_id, "agent.mock_job.submitted");

    tokio::spawn(async move {
        match done.await {
            Ok(result) if result.success => info!(%job_id, "agent.mock_job.succeeded"),
            Ok(result) => warn!(
                %job_id,
                error = result.error.as_deref().unwrap_or_default(),
                code = result.error_code.as_deref().unwrap_or_default(),
                "agent.mock_job.failed"
            ),
            Err(_) => warn!(%job_id, "agent.mock_job.abandoned"),
        }
    });
    Ok(())
}
