//! Integration authorization
//!
//! The backend submits raw credentials for a new integration; the agent
//! validates them, seals them with the device key, and echoes the sealed
//! token back. Raw credentials are never persisted or logged.

pub mod ports;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tidewater_domain::constants::TOPIC_INTEGRATION_RESPONSE;
use tidewater_domain::events::{IntegrationAuthorization, IntegrationRequest, IntegrationResponse};
use tidewater_domain::{AgentError, AgentEvent, DeviceIdentity, Result};
use tracing::{debug, info, warn};

use crate::bus::{transport_error, Envelope, EventBus, EventHandler};
use ports::{CredentialCipher, CredentialValidator};

/// Handler for integration-request events.
pub struct IntegrationRequestHandler {
    bus: Arc<dyn EventBus>,
    identity: DeviceIdentity,
    cipher: Arc<dyn CredentialCipher>,
    validator: Arc<dyn CredentialValidator>,
}

impl IntegrationRequestHandler {
    pub fn new(
        bus: Arc<dyn EventBus>,
        identity: DeviceIdentity,
        cipher: Arc<dyn CredentialCipher>,
        validator: Arc<dyn CredentialValidator>,
    ) -> Self {
        Self { bus, identity, cipher, validator }
    }

    /// Validate and seal the submitted credentials.
    ///
    /// Validation failures are always reported as `Validation` errors and the
    /// credentials are not encrypted.
    pub async fn authorize(&self, integration: &IntegrationAuthorization) -> Result<String> {
        self.validator.validate(integration).await.map_err(|err| match err {
            AgentError::Validation(_) => err.with_context(&integration.name),
            other => AgentError::Validation(format!("{}: {other}", integration.name)),
        })?;

        let plaintext = serde_json::to_string(&integration.authorization)?;
        self.cipher
            .encrypt_text(&plaintext, &self.identity.encryption_key)
            .map_err(|err| err.with_context(format!("seal credentials for {}", integration.name)))
    }

    fn response(
        &self,
        request: &IntegrationRequest,
        outcome: &Result<String>,
    ) -> IntegrationResponse {
        let integration = &request.integration;
        let (success, error, error_code, authorization) = match outcome {
            Ok(sealed) => (true, None, None, Some(sealed.clone())),
            Err(err) => (false, Some(err.to_string()), Some(err.code().to_string()), None),
        };
        IntegrationResponse {
            request_id: request.request_id.clone(),
            ref_id: integration.ref_id.clone(),
            ref_type: integration.system_type.map(|t| t.to_string()).unwrap_or_default(),
            uuid: self.identity.device_id,
            success,
            error,
            error_code,
            message: success.then(|| format!("{} authorized", integration.name)),
            authorization,
            event_date: Utc::now(),
        }
    }
}

#[async_trait]
impl EventHandler for IntegrationRequestHandler {
    async fn handle(&self, envelope: Envelope) -> Result<()> {
        let AgentEvent::IntegrationRequest(request) = envelope.event else {
            debug!(topic = %envelope.topic, "integration.request.ignored");
            return Ok(());
        };

        let outcome = self.authorize(&request.integration).await;
        match &outcome {
            Ok(_) => info!(
                request_id = %request.request_id,
                integration = %request.integration.name,
                "integration.authorized"
            ),
            Err(err) => warn!(
                request_id = %request.request_id,
                integration = %request.integration.name,
                error = %err,
                "integration.rejected"
            ),
        }

        let response = self.response(&request, &outcome);
        self.bus
            .publish(TOPIC_INTEGRATION_RESPONSE, response.into(), self.identity.headers())
            .await
            .map_err(|err| transport_error("publish integration response", err))
    }
}
