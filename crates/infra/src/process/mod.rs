//! Worker process isolation

pub mod bundle;
pub mod runner;

pub use bundle::TransientConfigBundle;
pub use runner::ProcessIntegrationRunner;
