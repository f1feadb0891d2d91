//! Event bus boundary
//!
//! The real transport lives outside this crate; services only see the
//! [`ports::EventBus`] trait and explicit subscription handles.

pub mod ports;

pub use ports::{Envelope, EventBus, EventHandler, Subscription, SubscriptionSpec};

use tidewater_domain::AgentError;

/// Normalize an adapter failure into a `Transport` error naming the
/// operation that failed.
pub fn transport_error(operation: &str, err: AgentError) -> AgentError {
    match err {
        AgentError::Transport(_) => err.with_context(operation),
        other => AgentError::Transport(format!("{operation}: {other}")),
    }
}
