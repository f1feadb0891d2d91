//! Incremental vs. historical classification

use tidewater_domain::{ExportType, IntegrationRef, IntegrationStatus, Result};

use crate::export::ports::StateStore;

/// Classify every integration of a job.
///
/// `reprocess_historical` forces HISTORICAL for all of them without touching
/// the store. Otherwise an integration is INCREMENTAL iff the store holds a
/// non-empty marker for its stable id. A store error aborts classification.
pub async fn classify(
    store: &dyn StateStore,
    integrations: &[IntegrationRef],
    reprocess_historical: bool,
) -> Result<Vec<IntegrationStatus>> {
    let mut statuses = Vec::with_capacity(integrations.len());
    for integration in integrations {
        let export_type = if reprocess_historical {
            ExportType::Historical
        } else {
            let marker = store
                .get(&integration.stable_id)
                .await
                .map_err(|err| err.with_context(&integration.name))?;
            match marker {
                Some(marker) if !marker.is_empty() => ExportType::Incremental,
                _ => ExportType::Historical,
            }
        };
        statuses.push(IntegrationStatus::classified(integration, export_type));
    }
    Ok(statuses)
}
