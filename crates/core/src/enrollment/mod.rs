//! One-shot enrollment handshake
//!
//! Produces the persisted [`tidewater_domain::DeviceIdentity`]. The response
//! subscription is registered and confirmed ready before the request is
//! published, so a fast backend answer can never be missed.

pub mod ports;
mod service;

pub use service::{EnrollmentState, Enroller};
