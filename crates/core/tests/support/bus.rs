//! In-memory event bus fake
//!
//! Delivers synchronously to matching subscriptions and enforces the
//! enrollment ordering rule: publishing an enrollment request before the
//! response subscription reported ready is a transport error.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tidewater_core::{Envelope, EventBus, EventHandler, Subscription, SubscriptionSpec};
use tidewater_domain::constants::{TOPIC_ENROLL_REQUEST, TOPIC_ENROLL_RESPONSE};
use tidewater_domain::events::EnrollResponse;
use tidewater_domain::{AgentError, AgentEvent, Headers, Result};

/// What the fake backend does when it sees an enrollment request.
#[derive(Clone)]
pub enum EnrollResponder {
    /// Answer `copies` times with the given credentials
    Respond { api_key: String, customer_id: String, copies: usize },
    /// Drop every enrollment-response subscription without answering
    EndSubscription,
}

struct SubscriptionState {
    spec: SubscriptionSpec,
    handler: Mutex<Option<Arc<dyn EventHandler>>>,
    ready: AtomicBool,
    closed: AtomicBool,
}

struct FakeSubscription {
    state: Arc<SubscriptionState>,
}

#[async_trait]
impl Subscription for FakeSubscription {
    async fn wait_ready(&self) -> Result<()> {
        self.state.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state.closed.store(true, Ordering::SeqCst);
        self.state.handler.lock().take();
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeBus {
    calls: AtomicUsize,
    next_message: AtomicUsize,
    published: Mutex<Vec<(String, AgentEvent, Headers)>>,
    subscriptions: Mutex<Vec<Arc<SubscriptionState>>>,
    responder: Mutex<Option<EnrollResponder>>,
    fail_subscribe: AtomicBool,
    fail_publish: AtomicBool,
}

impl FakeBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_responder(responder: EnrollResponder) -> Arc<Self> {
        let bus = Self::default();
        *bus.responder.lock() = Some(responder);
        Arc::new(bus)
    }

    pub fn fail_subscribe(&self) {
        self.fail_subscribe.store(true, Ordering::SeqCst);
    }

    pub fn fail_publish(&self) {
        self.fail_publish.store(true, Ordering::SeqCst);
    }

    /// Total `publish` and `subscribe` invocations
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn published_on(&self, topic: &str) -> Vec<AgentEvent> {
        self.published
            .lock()
            .iter()
            .filter(|(t, _, _)| t == topic)
            .map(|(_, event, _)| event.clone())
            .collect()
    }

    pub fn published_headers(&self, topic: &str) -> Vec<Headers> {
        self.published
            .lock()
            .iter()
            .filter(|(t, _, _)| t == topic)
            .map(|(_, _, headers)| headers.clone())
            .collect()
    }

    pub fn subscription_specs(&self) -> Vec<SubscriptionSpec> {
        self.subscriptions.lock().iter().map(|s| s.spec.clone()).collect()
    }

    pub fn open_subscriptions(&self) -> usize {
        self.subscriptions.lock().iter().filter(|s| !s.closed.load(Ordering::SeqCst)).count()
    }

    /// Deliver an inbound message to every matching open subscription
    pub async fn deliver(&self, topic: &str, event: AgentEvent, headers: Headers) -> Result<()> {
        let handlers: Vec<Arc<dyn EventHandler>> = self
            .subscriptions
            .lock()
            .iter()
            .filter(|s| s.spec.topic == topic && s.spec.matches(&headers))
            .filter_map(|s| s.handler.lock().clone())
            .collect();

        for handler in handlers {
            let id = self.next_message.fetch_add(1, Ordering::SeqCst);
            let envelope = Envelope {
                message_id: format!("msg-{id}"),
                topic: topic.to_string(),
                headers: headers.clone(),
                event: event.clone(),
            };
            handler.handle(envelope).await?;
        }
        Ok(())
    }

    fn response_subscription_ready(&self) -> bool {
        self.subscriptions.lock().iter().any(|s| {
            s.spec.topic == TOPIC_ENROLL_RESPONSE
                && s.ready.load(Ordering::SeqCst)
                && !s.closed.load(Ordering::SeqCst)
        })
    }

    async fn respond_to_enrollment(&self, event: &AgentEvent, headers: &Headers) -> Result<()> {
        let AgentEvent::EnrollRequest(request) = event else {
            return Ok(());
        };
        let responder = self.responder.lock().clone();
        match responder {
            Some(EnrollResponder::Respond { api_key, customer_id, copies }) => {
                let response = EnrollResponse { uuid: request.uuid, api_key, customer_id };
                for _ in 0..copies {
                    let event = response.clone().into();
                    self.deliver(TOPIC_ENROLL_RESPONSE, event, headers.clone()).await?;
                }
            }
            Some(EnrollResponder::EndSubscription) => {
                for state in self.subscriptions.lock().iter() {
                    if state.spec.topic == TOPIC_ENROLL_RESPONSE {
                        state.handler.lock().take();
                    }
                }
            }
            None => {}
        }
        Ok(())
    }
}

#[async_trait]
impl EventBus for FakeBus {
    async fn publish(&self, topic: &str, event: AgentEvent, headers: Headers) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(AgentError::Transport("broker unavailable".into()));
        }
        if topic == TOPIC_ENROLL_REQUEST && !self.response_subscription_ready() {
            return Err(AgentError::Transport("published before subscriber was ready".into()));
        }
        self.published.lock().push((topic.to_string(), event.clone(), headers.clone()));
        self.respond_to_enrollment(&event, &headers).await
    }

    async fn subscribe(
        &self,
        spec: SubscriptionSpec,
        handler: Arc<dyn EventHandler>,
    ) -> Result<Box<dyn Subscription>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(AgentError::Transport("subscription rejected".into()));
        }
        let state = Arc::new(SubscriptionState {
            spec,
            handler: Mutex::new(Some(handler)),
            ready: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });
        self.subscriptions.lock().push(Arc::clone(&state));
        Ok(Box::new(FakeSubscription { state }))
    }
}
