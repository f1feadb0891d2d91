//! In-process event bus
//!
//! Delivers published events to subscriptions registered on the same bus.
//! Payloads cross the bus in their JSON wire form and are decoded again
//! through the [`EventRegistry`], so handlers see exactly what a remote
//! transport would hand them.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tidewater_core::{Envelope, EventBus, EventHandler, Subscription, SubscriptionSpec};
use tidewater_domain::{AgentError, AgentEvent, Headers, Result};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::registry::EventRegistry;

#[derive(Debug, Clone)]
struct WireMessage {
    message_id: String,
    topic: String,
    type_name: String,
    headers: Headers,
    payload: Value,
}

struct Route {
    id: u64,
    spec: SubscriptionSpec,
    tx: mpsc::UnboundedSender<WireMessage>,
}

/// Loopback [`EventBus`].
///
/// Within one consumer group each message reaches a single subscription, the
/// oldest live one whose header filter matches.
pub struct InMemoryEventBus {
    registry: Arc<EventRegistry>,
    routes: Arc<Mutex<Vec<Route>>>,
    next_id: AtomicU64,
}

impl InMemoryEventBus {
    pub fn new(registry: EventRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            routes: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Live subscriptions on `topic`
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.routes.lock().iter().filter(|r| r.spec.topic == topic && !r.tx.is_closed()).count()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, topic: &str, event: AgentEvent, headers: Headers) -> Result<()> {
        let type_name = event.type_name();
        if !self.registry.contains(type_name) {
            return Err(AgentError::Transport(format!(
                "publish to {topic}: message type {type_name} is not registered"
            )));
        }
        let message = WireMessage {
            message_id: Uuid::now_v7().to_string(),
            topic: topic.to_string(),
            type_name: type_name.to_string(),
            headers,
            payload: event.to_payload()?,
        };

        let mut delivered = 0usize;
        {
            let mut routes = self.routes.lock();
            routes.retain(|route| !route.tx.is_closed());

            let mut served_groups: HashSet<String> = HashSet::new();
            for route in routes.iter() {
                if route.spec.topic != topic || !route.spec.matches(&message.headers) {
                    continue;
                }
                if served_groups.contains(route.spec.group_id.as_str()) {
                    continue;
                }
                if route.tx.send(message.clone()).is_ok() {
                    served_groups.insert(route.spec.group_id.clone());
                    delivered += 1;
                }
            }
        }

        debug!(
            topic,
            message_type = type_name,
            message_id = %message.message_id,
            delivered,
            "bus.message.published"
        );
        Ok(())
    }

    async fn subscribe(
        &self,
        spec: SubscriptionSpec,
        handler: Arc<dyn EventHandler>,
    ) -> Result<Box<dyn Subscription>> {
        if spec.topic.is_empty() {
            return Err(AgentError::Transport("subscribe: topic must not be empty".into()));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = watch::channel(false);
        let cancel = CancellationToken::new();

        self.routes.lock().push(Route { id, spec: spec.clone(), tx });

        tokio::spawn(deliver_loop(
            id,
            spec.clone(),
            Arc::clone(&self.registry),
            handler,
            rx,
            ready_tx,
            cancel.clone(),
        ));

        debug!(
            topic = %spec.topic,
            group_id = %spec.group_id,
            subscription_id = id,
            "bus.subscription.registered"
        );
        Ok(Box::new(LoopbackSubscription {
            id,
            routes: Arc::clone(&self.routes),
            ready: ready_rx,
            cancel,
        }))
    }
}

async fn deliver_loop(
    id: u64,
    spec: SubscriptionSpec,
    registry: Arc<EventRegistry>,
    handler: Arc<dyn EventHandler>,
    mut rx: mpsc::UnboundedReceiver<WireMessage>,
    ready: watch::Sender<bool>,
    cancel: CancellationToken,
) {
    let _ = ready.send(true);

    loop {
        let message = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            message = rx.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        let event = match registry.decode(&message.type_name, message.payload) {
            Ok(event) => event,
            Err(err) => {
                warn!(
                    topic = %message.topic,
                    message_id = %message.message_id,
                    error = %err,
                    "bus.message.undecodable"
                );
                continue;
            }
        };
        let envelope = Envelope {
            message_id: message.message_id.clone(),
            topic: message.topic,
            headers: message.headers,
            event,
        };
        if let Err(err) = handler.handle(envelope).await {
            warn!(
                topic = %spec.topic,
                message_id = %message.message_id,
                error = %err,
                code = err.code(),
                "bus.handler.failed"
            );
        }
    }

    // Dropping the handler here ends any single-use senders it holds.
    debug!(topic = %spec.topic, subscription_id = id, "bus.subscription.closed");
}

struct LoopbackSubscription {
    id: u64,
    routes: Arc<Mutex<Vec<Route>>>,
    ready: watch::Receiver<bool>,
    cancel: CancellationToken,
}

impl LoopbackSubscription {
    fn shutdown(&self) {
        self.cancel.cancel();
        self.routes.lock().retain(|route| route.id != self.id);
    }
}

#[async_trait]
impl Subscription for LoopbackSubscription {
    async fn wait_ready(&self) -> Result<()> {
        let mut ready = self.ready.clone();
        ready
            .wait_for(|ready| *ready)
            .await
            .map(|_| ())
            .map_err(|_| AgentError::Transport("subscription ended before becoming ready".into()))
    }

    async fn close(&self) -> Result<()> {
        self.shutdown();
        Ok(())
    }
}

impl Drop for LoopbackSubscription {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use tidewater_domain::events::{Lifecycle, LifecycleKind};
    use tokio::sync::mpsc::UnboundedSender;

    use super::*;

    struct Forward(UnboundedSender<Envelope>);

    #[async_trait]
    impl EventHandler for Forward {
        async fn handle(&self, envelope: Envelope) -> Result<()> {
            let _ = self.0.send(envelope);
            Ok(())
        }
    }

    fn ping(device: Uuid) -> AgentEvent {
        Lifecycle {
            kind: LifecycleKind::Ping,
            uuid: device,
            customer_id: "c1".into(),
            success: true,
            event_date: Utc::now(),
        }
        .into()
    }

    fn headers(device: &str) -> Headers {
        Headers::from([("uuid".to_string(), device.to_string())])
    }

    fn forward(tx: &UnboundedSender<Envelope>) -> Arc<dyn EventHandler> {
        Arc::new(Forward(tx.clone()))
    }

    fn lifecycle(group: &str, headers: Headers) -> SubscriptionSpec {
        SubscriptionSpec::new("agent.Lifecycle", group, headers)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Envelope>) -> Envelope {
        tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn delivers_matching_messages_only() {
        let bus = InMemoryEventBus::new(EventRegistry::agent_events());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = bus.subscribe(lifecycle("agent-d1", headers("d1")), forward(&tx)).await.unwrap();
        sub.wait_ready().await.unwrap();

        let device = Uuid::new_v4();
        bus.publish("agent.Lifecycle", ping(device), headers("d2")).await.unwrap();
        bus.publish("agent.Export", ping(device), headers("d1")).await.unwrap();
        bus.publish("agent.Lifecycle", ping(device), headers("d1")).await.unwrap();

        let envelope = next(&mut rx).await;
        assert_eq!(envelope.topic, "agent.Lifecycle");
        match envelope.event {
            AgentEvent::Lifecycle(lifecycle) => {
                assert_eq!(lifecycle.uuid, device);
                assert_eq!(lifecycle.kind, LifecycleKind::Ping);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn one_delivery_per_group() {
        let bus = InMemoryEventBus::new(EventRegistry::agent_events());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _a = bus.subscribe(lifecycle("g", Headers::new()), forward(&tx)).await.unwrap();
        let _b = bus.subscribe(lifecycle("g", Headers::new()), forward(&tx)).await.unwrap();
        let _c = bus.subscribe(lifecycle("other", Headers::new()), forward(&tx)).await.unwrap();

        bus.publish("agent.Lifecycle", ping(Uuid::new_v4()), Headers::new()).await.unwrap();

        for _ in 0..2 {
            next(&mut rx).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_drops_the_handler() {
        let bus = InMemoryEventBus::new(EventRegistry::agent_events());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = bus.subscribe(lifecycle("g", Headers::new()), forward(&tx)).await.unwrap();
        drop(tx);
        sub.wait_ready().await.unwrap();
        assert_eq!(bus.subscriber_count("agent.Lifecycle"), 1);

        sub.close().await.unwrap();
        sub.close().await.unwrap();

        // The only sender lived in the handler.
        let closed = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert!(closed.is_none());
        assert_eq!(bus.subscriber_count("agent.Lifecycle"), 0);
    }

    #[tokio::test]
    async fn unregistered_type_is_rejected_on_publish() {
        let mut registry = EventRegistry::new();
        registry.register::<tidewater_domain::events::ExportLog>();
        let bus = InMemoryEventBus::new(registry);

        let err =
            bus.publish("agent.Lifecycle", ping(Uuid::new_v4()), Headers::new()).await.unwrap_err();
        assert_eq!(err.code(), "transport_error");
    }
}
