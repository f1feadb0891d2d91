//! In-process onboarding samples

use async_trait::async_trait;
use serde_json::Value;
use tidewater_core::OnboardExporter;
use tidewater_domain::events::OnboardKind;
use tidewater_domain::Result;

use crate::worker::ExporterRegistry;

/// Serves onboarding requests from the exporters registered in this binary.
#[derive(Clone)]
pub struct ExporterOnboarder {
    exporters: ExporterRegistry,
}

impl ExporterOnboarder {
    pub fn new(exporters: ExporterRegistry) -> Self {
        Self { exporters }
    }
}

#[async_trait]
impl OnboardExporter for ExporterOnboarder {
    async fn onboard(
        &self,
        kind: OnboardKind,
        integration: &str,
        credentials: &Value,
    ) -> Result<Vec<Value>> {
        self.exporters.require(integration)?.onboard(kind, credentials).await
    }
}
