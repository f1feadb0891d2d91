//! Port interface for onboarding samples

use async_trait::async_trait;
use serde_json::Value;
use tidewater_domain::events::OnboardKind;
use tidewater_domain::Result;

/// Pulls a sample of records from a third-party system.
#[async_trait]
pub trait OnboardExporter: Send + Sync {
    /// `credentials` are the opened credentials of `integration`. Kinds the
    /// integration has no notion of fail with `AgentError::InvalidInput`.
    async fn onboard(
        &self,
        kind: OnboardKind,
        integration: &str,
        credentials: &Value,
    ) -> Result<Vec<Value>>;
}
