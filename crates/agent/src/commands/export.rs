//! `tidewater export`, the worker process entry point

use std::sync::Arc;

use tidewater_infra::{AesGcmVault, ExportWorker, ExporterRegistry, WorkerInvocation};
use tracing::info;

use crate::cli::ExportArgs;

pub async fn execute(args: ExportArgs) -> anyhow::Result<()> {
    let invocation = WorkerInvocation {
        integrations_file: args.integrations_file,
        agent_config_file: args.agent_config_file,
        job_id: args.job_id,
        reprocess_historical: args.reprocess_historical,
    };

    let worker = ExportWorker::new(ExporterRegistry::builtin(), Arc::new(AesGcmVault::new()));
    let summary = worker.run(&invocation).await?;
    info!(
        job_id = %invocation.job_id,
        integrations = summary.integrations,
        artifacts = summary.artifacts,
        markers_updated = summary.markers_updated,
        "worker.completed"
    );
    Ok(())
}
