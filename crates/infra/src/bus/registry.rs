//! Message-type registry used to decode bus payloads

use std::collections::HashMap;

use serde_json::Value;
use tidewater_domain::events::{
    EnrollRequest, EnrollResponse, ExportLog, ExportRequest, ExportResponse, IntegrationRequest,
    IntegrationResponse, Lifecycle, OnboardRequest, OnboardResponse,
};
use tidewater_domain::{AgentError, AgentEvent, EventMessage, Result};

type Decoder = fn(Value) -> Result<AgentEvent>;

/// Maps message-type names to typed decoders.
///
/// Passed to the bus adapter at construction; messages whose type is not
/// registered are rejected rather than guessed at.
#[derive(Clone, Default)]
pub struct EventRegistry {
    decoders: HashMap<&'static str, Decoder>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every agent payload type.
    pub fn agent_events() -> Self {
        let mut registry = Self::new();
        registry
            .register::<EnrollRequest>()
            .register::<EnrollResponse>()
            .register::<ExportRequest>()
            .register::<ExportResponse>()
            .register::<IntegrationRequest>()
            .register::<IntegrationResponse>()
            .register::<ExportLog>()
            .register::<Lifecycle>()
            .register::<OnboardRequest>()
            .register::<OnboardResponse>();
        registry
    }

    pub fn register<T: EventMessage>(&mut self) -> &mut Self {
        self.decoders.insert(T::TYPE_NAME, decode_as::<T>);
        self
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.decoders.contains_key(type_name)
    }

    pub fn decode(&self, type_name: &str, payload: Value) -> Result<AgentEvent> {
        let decoder = self.decoders.get(type_name).ok_or_else(|| {
            AgentError::Serialization(format!("unregistered message type {type_name}"))
        })?;
        decoder(payload).map_err(|e| e.with_context(type_name))
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.decoders.keys().collect();
        names.sort();
        f.debug_struct("EventRegistry").field("types", &names).finish()
    }
}

fn decode_as<T: EventMessage>(payload: Value) -> Result<AgentEvent> {
    Ok(serde_json::from_value::<T>(payload)?.into())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_registered_types() {
        let registry = EventRegistry::agent_events();
        let event = registry
            .decode(
                "agent.ExportRequest",
                json!({"job_id": "j1", "request_date": "2024-05-01T00:00:00Z"}),
            )
            .unwrap();
        match event {
            AgentEvent::ExportRequest(request) => {
                assert_eq!(request.job_id, "j1");
                assert!(request.integrations.is_empty());
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(registry.contains("agent.OnboardRequest"));
        assert!(registry.contains("agent.OnboardResponse"));
    }

    #[test]
    fn rejects_unknown_and_malformed_payloads() {
        let mut registry = EventRegistry::new();
        registry.register::<Lifecycle>();

        assert!(!registry.contains("agent.ExportRequest"));
        let err = registry.decode("agent.ExportRequest", json!({})).unwrap_err();
        assert_eq!(err.code(), "serialization_error");

        let err = registry.decode("agent.Lifecycle", json!({"kind": "BOGUS"})).unwrap_err();
        assert!(err.to_string().contains("agent.Lifecycle"));
    }
}
