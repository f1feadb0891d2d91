//! Lifecycle notifications and the periodic ping loop

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tidewater_domain::constants::TOPIC_LIFECYCLE;
use tidewater_domain::events::{Lifecycle, LifecycleKind};
use tidewater_domain::{DeviceIdentity, Result};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::bus::{transport_error, EventBus};
use crate::export::error::{SchedulerError, SchedulerResult};

/// Publish one lifecycle event for this device
pub async fn publish_lifecycle(
    bus: &dyn EventBus,
    identity: &DeviceIdentity,
    kind: LifecycleKind,
) -> Result<()> {
    let event = Lifecycle {
        kind,
        uuid: identity.device_id,
        customer_id: identity.customer_id.clone(),
        success: true,
        event_date: Utc::now(),
    };
    bus.publish(TOPIC_LIFECYCLE, event.into(), identity.headers())
        .await
        .map_err(|err| transport_error("publish lifecycle", err))
}

/// Publishes a `Ping` lifecycle event every interval until stopped.
///
/// Publish failures are logged and never stop the loop.
pub struct Heartbeat {
    bus: Arc<dyn EventBus>,
    identity: DeviceIdentity,
    interval: Duration,
    cancellation_token: CancellationToken,
    task_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Heartbeat {
    pub fn new(bus: Arc<dyn EventBus>, identity: DeviceIdentity, interval: Duration) -> Self {
        Self {
            bus,
            identity,
            interval,
            cancellation_token: CancellationToken::new(),
            task_handle: Mutex::new(None),
        }
    }

    /// Start the ping loop. The first ping fires one interval after start.
    ///
    /// # Errors
    ///
    /// Returns error if the loop is already running
    #[instrument(skip(self), fields(interval_secs = self.interval.as_secs()))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        let mut task = self.task_handle.lock().await;
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Err(SchedulerError::AlreadyRunning);
        }

        // Fresh token so the loop can be restarted after stop
        self.cancellation_token = CancellationToken::new();
        let cancel = self.cancellation_token.clone();
        let bus = Arc::clone(&self.bus);
        let identity = self.identity.clone();
        let period = self.interval;

        *task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!("heartbeat.cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        let ping = LifecycleKind::Ping;
                        match publish_lifecycle(bus.as_ref(), &identity, ping).await {
                            Ok(()) => debug!("heartbeat.ping"),
                            Err(err) => warn!(error = %err, "heartbeat.ping_failed"),
                        }
                    }
                }
            }
        }));

        info!("heartbeat.started");
        Ok(())
    }

    /// Stop the ping loop and wait for it to exit.
    ///
    /// # Errors
    ///
    /// Returns error if the loop is not running
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        let Some(handle) = self.task_handle.lock().await.take() else {
            return Err(SchedulerError::NotRunning);
        };
        self.cancellation_token.cancel();
        handle.await.map_err(|err| SchedulerError::TaskJoinFailed(err.to_string()))?;
        info!("heartbeat.stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.task_handle.lock().await.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}
