//! Enrollment service

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tidewater_domain::constants::{HEADER_DEVICE_ID, TOPIC_ENROLL_REQUEST, TOPIC_ENROLL_RESPONSE};
use tidewater_domain::events::{EnrollRequest, EnrollResponse};
use tidewater_domain::{group_id_for, AgentError, AgentEvent, DeviceIdentity, Headers, Result};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bus::{transport_error, Envelope, EventBus, EventHandler, Subscription, SubscriptionSpec};
use crate::enrollment::ports::IdentityStore;
use crate::integration::ports::CredentialCipher;

/// Progress of one enrollment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentState {
    Init,
    Subscribing,
    Ready,
    RequestSent,
    Waiting,
    ResponseReceived,
    Persisted,
    Error,
}

impl fmt::Display for EnrollmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Subscribing => "subscribing",
            Self::Ready => "ready",
            Self::RequestSent => "request_sent",
            Self::Waiting => "waiting",
            Self::ResponseReceived => "response_received",
            Self::Persisted => "persisted",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Runs the enrollment handshake against the event bus.
pub struct Enroller {
    bus: Arc<dyn EventBus>,
    store: Arc<dyn IdentityStore>,
    cipher: Arc<dyn CredentialCipher>,
    system_id: String,
    state: Mutex<EnrollmentState>,
}

impl Enroller {
    pub fn new(
        bus: Arc<dyn EventBus>,
        store: Arc<dyn IdentityStore>,
        cipher: Arc<dyn CredentialCipher>,
        system_id: impl Into<String>,
    ) -> Self {
        Self {
            bus,
            store,
            cipher,
            system_id: system_id.into(),
            state: Mutex::new(EnrollmentState::Init),
        }
    }

    /// Current state of the most recent attempt
    pub fn state(&self) -> EnrollmentState {
        *self.state.lock()
    }

    /// Enroll this device with a one-time `code` on `channel`.
    ///
    /// # Errors
    /// - `AlreadyEnrolled` if an identity is already stored; no bus call is
    ///   made in that case
    /// - `InvalidInput` for an empty code or channel
    /// - `Transport` if subscribing or publishing fails, or the subscription
    ///   ends before a response arrives
    pub async fn enroll(&self, code: &str, channel: &str) -> Result<DeviceIdentity> {
        self.transition(EnrollmentState::Init);
        let outcome = self.run(code, channel).await;
        if let Err(err) = &outcome {
            warn!(state = %self.state(), error = %err, "enrollment.failed");
            self.transition(EnrollmentState::Error);
        }
        outcome
    }

    async fn run(&self, code: &str, channel: &str) -> Result<DeviceIdentity> {
        if self.store.exists().await? {
            return Err(AgentError::AlreadyEnrolled);
        }
        if code.trim().is_empty() {
            return Err(AgentError::InvalidInput("enrollment code is required".into()));
        }
        if channel.trim().is_empty() {
            return Err(AgentError::InvalidInput("channel is required".into()));
        }

        let device_id = Uuid::new_v4();
        let mut headers = Headers::new();
        headers.insert(HEADER_DEVICE_ID.to_string(), device_id.to_string());

        self.transition(EnrollmentState::Subscribing);
        let (response_tx, response_rx) = oneshot::channel();
        let handler = Arc::new(EnrollResponseHandler::new(device_id, response_tx));
        let group_id = group_id_for(&device_id);
        let spec = SubscriptionSpec::new(TOPIC_ENROLL_RESPONSE, group_id, headers.clone());
        let subscription = self
            .bus
            .subscribe(spec, handler)
            .await
            .map_err(|err| transport_error("subscribe to enrollment responses", err))?;

        let outcome = self
            .handshake(&*subscription, device_id, code, channel, headers, response_rx)
            .await;

        if let Err(err) = subscription.close().await {
            warn!(error = %err, "enrollment.subscription.close_failed");
        }
        outcome
    }

    async fn handshake(
        &self,
        subscription: &dyn Subscription,
        device_id: Uuid,
        code: &str,
        channel: &str,
        headers: Headers,
        response_rx: oneshot::Receiver<EnrollResponse>,
    ) -> Result<DeviceIdentity> {
        subscription
            .wait_ready()
            .await
            .map_err(|err| transport_error("wait for enrollment subscription", err))?;
        self.transition(EnrollmentState::Ready);

        let request = EnrollRequest {
            code: code.to_string(),
            uuid: device_id,
            system_id: self.system_id.clone(),
            request_date: Utc::now(),
        };
        self.bus
            .publish(TOPIC_ENROLL_REQUEST, request.into(), headers)
            .await
            .map_err(|err| transport_error("publish enrollment request", err))?;
        self.transition(EnrollmentState::RequestSent);

        self.transition(EnrollmentState::Waiting);
        let response = response_rx.await.map_err(|_| {
            AgentError::Transport("enrollment subscription ended before a response arrived".into())
        })?;
        self.transition(EnrollmentState::ResponseReceived);

        let identity = DeviceIdentity {
            api_key: response.api_key,
            customer_id: response.customer_id,
            channel: channel.to_string(),
            device_id,
            system_id: self.system_id.clone(),
            encryption_key: self.cipher.generate_key()?,
        };
        self.store.save(&identity).await?;
        self.transition(EnrollmentState::Persisted);

        info!(
            device_id = %identity.device_id,
            customer_id = %identity.customer_id,
            "enrollment.persisted"
        );
        Ok(identity)
    }

    fn transition(&self, next: EnrollmentState) {
        let mut state = self.state.lock();
        debug!(from = %*state, to = %next, "enrollment.state");
        *state = next;
    }
}

/// Single-shot handler for enrollment responses.
///
/// Only the first response for its device id is forwarded; redeliveries and
/// duplicates are dropped.
struct EnrollResponseHandler {
    device_id: Uuid,
    fired: AtomicBool,
    sender: Mutex<Option<oneshot::Sender<EnrollResponse>>>,
}

impl EnrollResponseHandler {
    fn new(device_id: Uuid, sender: oneshot::Sender<EnrollResponse>) -> Self {
        Self { device_id, fired: AtomicBool::new(false), sender: Mutex::new(Some(sender)) }
    }
}

#[async_trait]
impl EventHandler for EnrollResponseHandler {
    async fn handle(&self, envelope: Envelope) -> Result<()> {
        let AgentEvent::EnrollResponse(response) = envelope.event else {
            debug!(topic = %envelope.topic, "enrollment.response.unexpected_event");
            return Ok(());
        };
        if response.uuid != self.device_id {
            debug!(uuid = %response.uuid, "enrollment.response.other_device");
            return Ok(());
        }
        if self.fired.swap(true, Ordering::SeqCst) {
            debug!(message_id = %envelope.message_id, "enrollment.response.duplicate");
            return Ok(());
        }
        if let Some(sender) = self.sender.lock().take() {
            // The waiter may already have given up; nothing to do then.
            let _ = sender.send(response);
        }
        Ok(())
    }
}
