//! Port interfaces for device identity persistence

use async_trait::async_trait;
use tidewater_domain::{DeviceIdentity, Result};

/// Persistent home of the device identity.
///
/// The presence of a stored identity is the enrollment marker.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Whether an identity has already been persisted
    async fn exists(&self) -> Result<bool>;

    /// Load the persisted identity, if any
    async fn load(&self) -> Result<Option<DeviceIdentity>>;

    /// Persist the identity atomically; readers never observe a partial file
    async fn save(&self, identity: &DeviceIdentity) -> Result<()>;
}
