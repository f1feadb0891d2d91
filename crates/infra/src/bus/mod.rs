//! Event bus adapters
//!
//! The loopback bus stands in for the remote transport; everything above it
//! only sees the `EventBus` port.

pub mod local_backend;
pub mod log_sink;
pub mod loopback;
pub mod registry;

pub use local_backend::LocalBackend;
pub use log_sink::{BusLogSink, BusLogSinkProvider};
pub use loopback::InMemoryEventBus;
pub use registry::EventRegistry;
