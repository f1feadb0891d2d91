//! # Tidewater Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - Filesystem layout, settings loading, and file-backed stores
//! - The AES-256-GCM credential vault
//! - The worker-process runner and the worker-side export executor
//! - The loopback event bus, its payload registry, and the bus log sink
//! - The HTTP artifact uploader
//! - Exporter-backed credential validation and onboarding samples
//! - Host fingerprinting and the single-instance lock
//!
//! ## Architecture
//! - Implements traits defined in `tidewater-core`
//! - Depends on `tidewater-domain` and `tidewater-core`
//! - Contains all "impure" code (I/O, processes, network)

pub mod bus;
pub mod config;
pub mod errors;
pub mod http;
pub mod instance_lock;
pub mod onboard;
pub mod platform;
pub mod process;
pub mod storage;
pub mod validator;
pub mod vault;
pub mod worker;

// Re-export commonly used items
pub use bus::{BusLogSink, BusLogSinkProvider, EventRegistry, InMemoryEventBus, LocalBackend};
pub use config::AgentPaths;
pub use errors::InfraError;
pub use http::{HttpArtifactUploader, HttpClient};
pub use instance_lock::InstanceLock;
pub use onboard::ExporterOnboarder;
pub use platform::system_id;
pub use process::{ProcessIntegrationRunner, TransientConfigBundle};
pub use storage::{FileIdentityStore, JsonStateStore};
pub use validator::ExporterCredentialValidator;
pub use vault::AesGcmVault;
pub use worker::{ExportWorker, ExporterRegistry, WorkerInvocation};
