//! File-backed persistence

pub mod fs;
pub mod identity_store;
pub mod state_store;

pub use identity_store::FileIdentityStore;
pub use state_store::JsonStateStore;
