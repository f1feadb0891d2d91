//! Device identity issued by enrollment

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::constants::{ENCRYPTION_KEY_LEN, GROUP_PREFIX, HEADER_CUSTOMER_ID, HEADER_DEVICE_ID};
use crate::errors::{AgentError, Result};
use crate::events::Headers;

/// Per-device symmetric key used to seal third-party credentials.
///
/// Serialized as lower-case hex. `Debug` never prints the key material.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; ENCRYPTION_KEY_LEN]);

impl EncryptionKey {
    pub fn from_bytes(bytes: [u8; ENCRYPTION_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Build a key from a slice, rejecting anything that is not 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; ENCRYPTION_KEY_LEN] = bytes.try_into().map_err(|_| {
            AgentError::InvalidInput(format!(
                "encryption key must be exactly {ENCRYPTION_KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = hex::decode(encoded.trim())
            .map_err(|e| AgentError::InvalidInput(format!("encryption key is not hex: {e}")))?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ENCRYPTION_KEY_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}

impl Serialize for EncryptionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EncryptionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_hex(&raw).map_err(serde::de::Error::custom)
    }
}

/// Persisted device identity.
///
/// Created exactly once by enrollment and never mutated afterwards. The field
/// names match the on-disk device config file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    #[serde(rename = "apiKey")]
    pub api_key: String,
    #[serde(rename = "customerID")]
    pub customer_id: String,
    pub channel: String,
    #[serde(rename = "deviceID")]
    pub device_id: Uuid,
    #[serde(rename = "systemID")]
    pub system_id: String,
    #[serde(rename = "encryptionKey")]
    pub encryption_key: EncryptionKey,
}

impl DeviceIdentity {
    /// Consumer group shared by every subscription of this device.
    pub fn group_id(&self) -> String {
        group_id_for(&self.device_id)
    }

    /// Headers that scope inbound subscriptions and tag outbound events.
    pub fn headers(&self) -> Headers {
        let mut headers = Headers::new();
        headers.insert(HEADER_DEVICE_ID.to_string(), self.device_id.to_string());
        headers.insert(HEADER_CUSTOMER_ID.to_string(), self.customer_id.clone());
        headers
    }
}

impl fmt::Debug for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceIdentity")
            .field("api_key", &"[REDACTED]")
            .field("customer_id", &self.customer_id)
            .field("channel", &self.channel)
            .field("device_id", &self.device_id)
            .field("system_id", &self.system_id)
            .field("encryption_key", &self.encryption_key)
            .finish()
    }
}

/// Consumer group name derived from a device id.
pub fn group_id_for(device_id: &Uuid) -> String {
    format!("{GROUP_PREFIX}{device_id}")
}
