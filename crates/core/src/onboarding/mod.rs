//! Integration onboarding
//!
//! Before the first export, the backend asks for a sample of users, repos,
//! or projects so the customer can choose what to include. The agent opens
//! the sealed credentials with the device key, asks the exporter for the
//! records, and answers on the kind's response topic.

pub mod ports;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tidewater_domain::events::{OnboardRequest, OnboardResponse};
use tidewater_domain::{AgentError, AgentEvent, DeviceIdentity, Result};
use tracing::{debug, info, warn};

use crate::bus::{transport_error, Envelope, EventBus, EventHandler};
use crate::integration::ports::CredentialCipher;
use ports::OnboardExporter;

/// Handler for the user, repo, and project request topics.
pub struct OnboardRequestHandler {
    bus: Arc<dyn EventBus>,
    identity: DeviceIdentity,
    cipher: Arc<dyn CredentialCipher>,
    exporter: Arc<dyn OnboardExporter>,
}

impl OnboardRequestHandler {
    pub fn new(
        bus: Arc<dyn EventBus>,
        identity: DeviceIdentity,
        cipher: Arc<dyn CredentialCipher>,
        exporter: Arc<dyn OnboardExporter>,
    ) -> Self {
        Self { bus, identity, cipher, exporter }
    }

    /// Open the integration's credentials and fetch the requested records.
    pub async fn records(&self, request: &OnboardRequest) -> Result<Vec<Value>> {
        let integration = &request.integration;
        integration.validate()?;

        let opened = self
            .cipher
            .decrypt_text(&integration.encrypted_auth, &self.identity.encryption_key)
            .map_err(|err| err.with_context(format!("open credentials for {}", integration.name)))?;
        let credentials: Value = serde_json::from_str(&opened).map_err(|_| {
            let name = &integration.name;
            AgentError::Decryption(format!("credentials for {name} are not a JSON document"))
        })?;

        self.exporter.onboard(request.kind, &integration.name, &credentials).await
    }

    fn response(&self, request: &OnboardRequest, outcome: Result<Vec<Value>>) -> OnboardResponse {
        let (success, error, error_code, records) = match outcome {
            Ok(records) => (true, None, None, records),
            Err(err) => (false, Some(err.to_string()), Some(err.code().to_string()), Vec::new()),
        };
        OnboardResponse {
            request_id: request.request_id.clone(),
            kind: request.kind,
            ref_type: request.ref_type.clone(),
            ref_id: request.ref_id.clone(),
            integration_id: request.integration.stable_id.clone(),
            uuid: self.identity.device_id,
            customer_id: self.identity.customer_id.clone(),
            success,
            error,
            error_code,
            records,
            event_date: Utc::now(),
        }
    }
}

#[async_trait]
impl EventHandler for OnboardRequestHandler {
    async fn handle(&self, envelope: Envelope) -> Result<()> {
        let AgentEvent::OnboardRequest(request) = envelope.event else {
            debug!(topic = %envelope.topic, "onboarding.request.ignored");
            return Ok(());
        };

        let outcome = self.records(&request).await;
        match &outcome {
            Ok(records) => info!(
                request_id = %request.request_id,
                kind = %request.kind,
                integration = %request.integration.name,
                records = records.len(),
                "onboarding.completed"
            ),
            Err(err) => warn!(
                request_id = %request.request_id,
                kind = %request.kind,
                integration = %request.integration.name,
                error = %err,
                "onboarding.failed"
            ),
        }

        let topic = request.kind.response_topic();
        let response = self.response(&request, outcome);
        self.bus
            .publish(topic, response.into(), self.identity.headers())
            .await
            .map_err(|err| transport_error("publish onboarding response", err))
    }
}
