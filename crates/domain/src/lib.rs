//! # Tidewater Domain
//!
//! Business domain types and models for the Tidewater agent.
//!
//! This crate contains:
//! - Device identity, export job, and integration types
//! - Event bus payloads exchanged with the backend
//! - Domain error taxonomy and Result definition
//! - Agent settings and worker hand-off documents
//!
//! ## Architecture
//! - No dependencies on other Tidewater crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod events;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use events::{AgentEvent, EventMessage, Headers};
pub use types::*;
