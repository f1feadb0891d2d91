//! Stand-in backend for the loopback bus
//!
//! Answers enrollment requests so `tidewater enroll` completes without a
//! remote transport, and logs the export and lifecycle traffic the agent
//! emits.

use std::sync::Arc;

use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::RngCore;
use tidewater_core::{Envelope, EventBus, EventHandler, Subscription, SubscriptionSpec};
use tidewater_domain::constants::{
    HEADER_DEVICE_ID, TOPIC_ENROLL_REQUEST, TOPIC_ENROLL_RESPONSE, TOPIC_EXPORT_RESPONSE,
    TOPIC_LIFECYCLE,
};
use tidewater_domain::events::EnrollResponse;
use tidewater_domain::{AgentError, AgentEvent, Headers, Result};
use tracing::info;

const BACKEND_GROUP: &str = "local-backend";

/// Customer every locally enrolled device is bound to.
pub const LOCAL_CUSTOMER_ID: &str = "local";

pub struct LocalBackend {
    subscriptions: Vec<Box<dyn Subscription>>,
}

impl LocalBackend {
    /// Subscribe the stand-in handlers on `bus`.
    pub async fn attach(bus: Arc<dyn EventBus>) -> Result<Self> {
        let mut subscriptions = Vec::new();

        let enroll = Arc::new(EnrollResponder { bus: Arc::clone(&bus) });
        subscriptions.push(bus.subscribe(backend_spec(TOPIC_ENROLL_REQUEST), enroll).await?);
        for topic in [TOPIC_EXPORT_RESPONSE, TOPIC_LIFECYCLE] {
            subscriptions.push(bus.subscribe(backend_spec(topic), Arc::new(TrafficLog)).await?);
        }
        for subscription in &subscriptions {
            subscription.wait_ready().await?;
        }
        Ok(Self { subscriptions })
    }

    pub async fn detach(self) -> Result<()> {
        for subscription in &self.subscriptions {
            subscription.close().await?;
        }
        Ok(())
    }
}

fn backend_spec(topic: &str) -> SubscriptionSpec {
    SubscriptionSpec::new(topic, BACKEND_GROUP, Headers::new())
}

struct EnrollResponder {
    bus: Arc<dyn EventBus>,
}

#[async_trait]
impl EventHandler for EnrollResponder {
    async fn handle(&self, envelope: Envelope) -> Result<()> {
        let AgentEvent::EnrollRequest(request) = envelope.event else {
            return Err(AgentError::InvalidInput(format!(
                "unexpected {} on {}",
                envelope.event.type_name(),
                envelope.topic
            )));
        };

        let mut key = [0u8; 24];
        OsRng
            .try_fill_bytes(&mut key)
            .map_err(|e| AgentError::Internal(format!("system random source unavailable: {e}")))?;
        let response = EnrollResponse {
            uuid: request.uuid,
            api_key: hex::encode(key),
            customer_id: LOCAL_CUSTOMER_ID.to_string(),
        };
        info!(device_id = %request.uuid, "local_backend.enroll.accepted");

        let headers = Headers::from([(HEADER_DEVICE_ID.to_string(), request.uuid.to_string())]);
        self.bus.publish(TOPIC_ENROLL_RESPONSE, response.into(), headers).await
    }
}

struct TrafficLog;

#[async_trait]
impl EventHandler for TrafficLog {
    async fn handle(&self, envelope: Envelope) -> Result<()> {
        let payload = envelope.event.to_payload()?;
        info!(topic = %envelope.topic, payload = %payload, "local_backend.event.received");
        Ok(())
    }
}
