//! Export scheduling and execution
//!
//! This module provides the single-flight scheduler, integration
//! classification, the export-request handler, and the ports the scheduler
//! drives.

pub mod classification;
pub mod error;
pub mod handler;
pub mod ports;
pub mod scheduler;

pub use classification::classify;
pub use error::{SchedulerError, SchedulerResult};
pub use handler::ExportRequestHandler;
pub use scheduler::{ExportContext, ExportScheduler, SchedulerHandle};
