//! Runs the mock job through the real scheduler, re-executing the built
//! `tidewater` binary as the worker.

use tidewater_agent::commands::run::mock_job;
use tidewater_agent::AgentContext;
use tidewater_core::{ExportScheduler, IdentityStore};
use tidewater_domain::constants::MOCK_INTEGRATION;
use tidewater_domain::{AgentSettings, DeviceIdentity, EncryptionKey};
use tidewater_infra::{AgentPaths, JsonStateStore};
use uuid::Uuid;

fn identity() -> DeviceIdentity {
    DeviceIdentity {
        api_key: "api-key".into(),
        customer_id: "local".into(),
        channel: "stable".into(),
        device_id: Uuid::new_v4(),
        system_id: "sys".into(),
        encryption_key: EncryptionKey::from_bytes([5; 32]),
    }
}

fn context(root: &std::path::Path) -> AgentContext {
    let settings = AgentSettings {
        worker_program: Some(env!("CARGO_BIN_EXE_tidewater").into()),
        ..AgentSettings::default()
    };
    AgentContext::new(AgentPaths::new(root), settings).unwrap()
}

#[tokio::test]
async fn mock_job_records_marker() {
    let dir = tempfile::tempdir().unwrap();
    let context = context(dir.path());
    let identity = identity();
    context.identity_store.save(&identity).await.unwrap();

    let scheduler = ExportScheduler::new(context.export_context(&identity).unwrap());
    let handle = scheduler.start().await.unwrap();

    let job = mock_job(context.cipher.as_ref(), &identity).unwrap();
    let result = handle.run(job).await.unwrap();
    scheduler.stop().await.unwrap();

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.integrations.len(), 1);
    assert_eq!(result.integrations[0].name, MOCK_INTEGRATION);

    let state = JsonStateStore::new(context.paths.last_processed());
    assert!(state.get_blocking(MOCK_INTEGRATION).unwrap().is_some());

    let leftovers = std::fs::read_dir(context.paths.temp_dir()).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn job_sealed_with_another_key_fails() {
    let dir = tempfile::tempdir().unwrap();
    let context = context(dir.path());
    let identity = identity();

    let stranger =
        DeviceIdentity { encryption_key: EncryptionKey::from_bytes([6; 32]), ..identity.clone() };
    let job = mock_job(context.cipher.as_ref(), &stranger).unwrap();

    let scheduler = ExportScheduler::new(context.export_context(&identity).unwrap());
    let handle = scheduler.start().await.unwrap();
    let result = handle.run(job).await.unwrap();
    scheduler.stop().await.unwrap();

    assert!(!result.success);
    assert_eq!(result.error_code.as_deref(), Some("process_error"));
}
