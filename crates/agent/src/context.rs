//! Dependency wiring shared by the agent commands

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tidewater_core::{
    CredentialCipher, Enroller, EventBus, ExportContext, IntegrationRequestHandler,
    JobLogSinkProvider, OnboardRequestHandler,
};
use tidewater_domain::{AgentSettings, DeviceIdentity, WorkerAgentConfig};
use tidewater_infra::{
    system_id, AesGcmVault, AgentPaths, BusLogSinkProvider, EventRegistry,
    ExporterCredentialValidator, ExporterOnboarder, ExporterRegistry, FileIdentityStore,
    HttpArtifactUploader, HttpClient, InMemoryEventBus, JsonStateStore, ProcessIntegrationRunner,
};

/// Long-lived collaborators for one agent root.
pub struct AgentContext {
    pub paths: AgentPaths,
    pub settings: AgentSettings,
    pub bus: Arc<dyn EventBus>,
    pub cipher: Arc<dyn CredentialCipher>,
    pub identity_store: Arc<FileIdentityStore>,
}

impl AgentContext {
    pub fn new(paths: AgentPaths, settings: AgentSettings) -> anyhow::Result<Self> {
        paths.ensure().context("failed to prepare agent root")?;
        let bus: Arc<dyn EventBus> = Arc::new(InMemoryEventBus::new(EventRegistry::agent_events()));
        let identity_store = Arc::new(FileIdentityStore::new(paths.device_config()));

        Ok(Self { paths, settings, bus, cipher: Arc::new(AesGcmVault::new()), identity_store })
    }

    pub fn enroller(&self) -> anyhow::Result<Enroller> {
        let system_id = system_id().context("failed to derive the system id")?;
        Ok(Enroller::new(
            Arc::clone(&self.bus),
            self.identity_store.clone(),
            Arc::clone(&self.cipher),
            system_id,
        ))
    }

    pub fn integration_handler(&self, identity: &DeviceIdentity) -> IntegrationRequestHandler {
        IntegrationRequestHandler::new(
            Arc::clone(&self.bus),
            identity.clone(),
            Arc::clone(&self.cipher),
            Arc::new(ExporterCredentialValidator::new(ExporterRegistry::builtin())),
        )
    }

    /// Onboarding samples are served in-process by the built-in exporters.
    pub fn onboard_handler(&self, identity: &DeviceIdentity) -> OnboardRequestHandler {
        OnboardRequestHandler::new(
            Arc::clone(&self.bus),
            identity.clone(),
            Arc::clone(&self.cipher),
            Arc::new(ExporterOnboarder::new(ExporterRegistry::builtin())),
        )
    }

    /// Collaborators for the export scheduler of an enrolled device.
    pub fn export_context(&self, identity: &DeviceIdentity) -> anyhow::Result<ExportContext> {
        let worker_config = WorkerAgentConfig::for_device(
            identity,
            self.paths.uploads_dir(),
            self.paths.last_processed(),
        );
        let program = self.worker_program()?;
        let runner = ProcessIntegrationRunner::new(program, self.paths.temp_dir(), worker_config);

        let client = HttpClient::builder()
            .api_key(&identity.api_key)?
            .build()
            .context("failed to build upload client")?;
        let uploader = HttpArtifactUploader::new(client, self.paths.uploads_dir());

        let log_sinks: Arc<dyn JobLogSinkProvider> = Arc::new(BusLogSinkProvider::new(
            Arc::clone(&self.bus),
            identity.clone(),
            self.settings.log_batch_size,
        ));

        Ok(ExportContext {
            bus: Arc::clone(&self.bus),
            identity: identity.clone(),
            state: Arc::new(JsonStateStore::new(self.paths.last_processed())),
            runner: Arc::new(runner),
            uploader: Arc::new(uploader),
            log_sinks: Some(log_sinks),
            extra_integrations: self.settings.extra_integrations.clone(),
            log_level: self.settings.log_level.clone(),
        })
    }

    /// Worker executable; the agent re-executes itself unless configured.
    pub fn worker_program(&self) -> anyhow::Result<PathBuf> {
        match &self.settings.worker_program {
            Some(program) => Ok(program.clone()),
            None => std::env::current_exe().context("failed to locate the agent executable"),
        }
    }
}
