//! # Tidewater Core
//!
//! Coordination logic for the agent - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for the event bus, persistence, the worker
//!   runner, artifact upload, and credential sealing
//! - The enrollment handshake
//! - The single-flight export scheduler and integration classification
//! - Integration authorization, onboarding samples, and the heartbeat loop
//!
//! ## Architecture Principles
//! - Only depends on `tidewater-domain`
//! - No filesystem, process, HTTP, or crypto code
//! - All external collaborators via traits
//! - Pure, testable coordination logic

pub mod bus;
pub mod enrollment;
pub mod export;
pub mod heartbeat;
pub mod integration;
pub mod onboarding;

// Re-export specific items to avoid ambiguity
pub use bus::ports::{Envelope, EventBus, EventHandler, Subscription, SubscriptionSpec};
pub use enrollment::ports::IdentityStore;
pub use enrollment::{EnrollmentState, Enroller};
pub use export::error::{SchedulerError, SchedulerResult};
pub use export::ports::{
    ArtifactUploader, IntegrationRunner, JobLogSink, JobLogSinkProvider, RunReport, RunRequest,
    StateStore, UploadOutcome,
};
pub use export::{classify, ExportContext, ExportRequestHandler, ExportScheduler, SchedulerHandle};
pub use heartbeat::{publish_lifecycle, Heartbeat};
pub use integration::ports::{CredentialCipher, CredentialValidator};
pub use integration::IntegrationRequestHandler;
pub use onboarding::ports::OnboardExporter;
pub use onboarding::OnboardRequestHandler;
