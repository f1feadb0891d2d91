//! `tidewater enroll`

use tidewater_domain::AgentError;
use tidewater_infra::LocalBackend;
use tracing::info;

use crate::cli::EnrollArgs;
use crate::context::AgentContext;

const NO_BACKEND: &str =
    "no backend transport is configured; pass --local-backend to enroll against the in-process backend";

pub async fn execute(
    context: &AgentContext,
    args: EnrollArgs,
    local_backend: bool,
) -> anyhow::Result<()> {
    if !local_backend {
        return Err(AgentError::Config(NO_BACKEND.into()).into());
    }
    let backend = LocalBackend::attach(context.bus.clone()).await?;
    let enroller = context.enroller()?;

    let result = enroller.enroll(&args.code, &args.channel).await;
    backend.detach().await?;

    let identity = result?;
    info!(
        device_id = %identity.device_id,
        customer_id = %identity.customer_id,
        channel = %identity.channel,
        path = %context.paths.device_config().display(),
        "enroll.completed"
    );
    Ok(())
}
