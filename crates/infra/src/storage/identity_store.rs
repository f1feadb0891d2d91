//! Device identity persisted as `<root>/config.json`

use std::path::PathBuf;

use async_trait::async_trait;
use tidewater_core::IdentityStore;
use tidewater_domain::{AgentError, DeviceIdentity, Result};
use tracing::info;

use crate::errors::infra_err;
use crate::storage::fs::write_new;

/// File-backed identity store.
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load an identity that must exist, as every post-enrollment command does.
    pub async fn require(&self) -> Result<DeviceIdentity> {
        self.load().await?.ok_or_else(|| {
            AgentError::Config(format!(
                "device is not enrolled: {} not found; run `tidewater enroll` first",
                self.path.display()
            ))
        })
    }
}

#[async_trait]
impl IdentityStore for FileIdentityStore {
    async fn exists(&self) -> Result<bool> {
        tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| infra_err(e, format!("check {}", self.path.display())))
    }

    async fn load(&self) -> Result<Option<DeviceIdentity>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(infra_err(err, format!("read {}", self.path.display()))),
        };
        let identity = serde_json::from_slice(&raw).map_err(|e| {
            AgentError::Config(format!("invalid device config {}: {e}", self.path.display()))
        })?;
        Ok(Some(identity))
    }

    /// Persist `identity` once; an existing device config is never replaced.
    async fn save(&self, identity: &DeviceIdentity) -> Result<()> {
        let contents = serde_json::to_vec_pretty(identity)?;
        let path = self.path.clone();
        let created = tokio::task::spawn_blocking(move || write_new(&path, &contents))
            .await
            .map_err(|e| AgentError::Internal(format!("identity write task failed: {e}")))??;
        if !created {
            return Err(AgentError::AlreadyEnrolled);
        }
        info!(path = %self.path.display(), device_id = %identity.device_id, "identity.saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tidewater_domain::EncryptionKey;
    use uuid::Uuid;

    use super::*;

    fn identity() -> DeviceIdentity {
        DeviceIdentity {
            api_key: "api".into(),
            customer_id: "cust".into(),
            channel: "stable".into(),
            device_id: Uuid::new_v4(),
            system_id: "sys".into(),
            encryption_key: EncryptionKey::from_bytes([3; 32]),
        }
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileIdentityStore::new(dir.path().join("config.json"));
        assert!(!store.exists().await.unwrap());
        assert!(store.load().await.unwrap().is_none());

        let identity = identity();
        store.save(&identity).await.unwrap();

        assert!(store.exists().await.unwrap());
        assert_eq!(store.require().await.unwrap(), identity);
    }

    #[tokio::test]
    async fn file_uses_device_config_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        FileIdentityStore::new(&path).save(&identity()).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["channel"], "stable");
        assert_eq!(raw["encryptionKey"], "03".repeat(32));
        assert!(raw.get("deviceID").is_some());
    }

    #[tokio::test]
    async fn second_save_keeps_first_identity() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileIdentityStore::new(dir.path().join("config.json"));
        let first = identity();
        store.save(&first).await.unwrap();

        let second = DeviceIdentity {
            api_key: "k2".into(),
            encryption_key: EncryptionKey::from_bytes([4; 32]),
            ..identity()
        };
        let err = store.save(&second).await.unwrap_err();

        assert!(matches!(err, AgentError::AlreadyEnrolled));
        assert_eq!(store.require().await.unwrap(), first);
    }

    #[tokio::test]
    async fn missing_identity_is_config_error_on_require() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileIdentityStore::new(dir.path().join("config.json"));
        let err = store.require().await.unwrap_err();
        assert_eq!(err.code(), "config_error");
    }
}
