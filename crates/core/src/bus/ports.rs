//! Port interfaces for the event bus
//!
//! These traits define the boundary between core services and the transport
//! adapter.

use std::sync::Arc;

use async_trait::async_trait;
use tidewater_domain::{AgentEvent, Headers, Result};

/// Where and how to subscribe.
///
/// Delivery is scoped to `topic`; only messages whose headers contain every
/// entry of `headers` reach the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSpec {
    pub topic: String,
    pub group_id: String,
    pub headers: Headers,
}

impl SubscriptionSpec {
    pub fn new(topic: impl Into<String>, group_id: impl Into<String>, headers: Headers) -> Self {
        Self { topic: topic.into(), group_id: group_id.into(), headers }
    }

    /// Whether a message with `headers` passes this subscription's filter.
    pub fn matches(&self, headers: &Headers) -> bool {
        self.headers.iter().all(|(key, value)| headers.get(key) == Some(value))
    }
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub message_id: String,
    pub topic: String,
    pub headers: Headers,
    pub event: AgentEvent,
}

/// Callback invoked for every delivered message.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one message. Errors are logged by the adapter and do not end
    /// the subscription.
    async fn handle(&self, envelope: Envelope) -> Result<()>;
}

/// Handle to a live subscription.
///
/// The adapter drops its handler when delivery stops for any reason, so
/// handlers holding single-use senders observe the shutdown.
#[async_trait]
pub trait Subscription: Send + Sync {
    /// Resolve once the subscription is registered and will receive
    /// messages published from now on.
    async fn wait_ready(&self) -> Result<()>;

    /// Stop delivery. Idempotent.
    async fn close(&self) -> Result<()>;
}

/// Trait for publishing and subscribing to backend events
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event on `topic` with the given routing headers
    async fn publish(&self, topic: &str, event: AgentEvent, headers: Headers) -> Result<()>;

    /// Register a subscription; delivery starts before `wait_ready` resolves
    async fn subscribe(
        &self,
        spec: SubscriptionSpec,
        handler: Arc<dyn EventHandler>,
    ) -> Result<Box<dyn Subscription>>;
}
