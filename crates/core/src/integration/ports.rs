//! Port interfaces for credential handling

use async_trait::async_trait;
use tidewater_domain::events::IntegrationAuthorization;
use tidewater_domain::{EncryptionKey, Result};

/// Symmetric sealing of third-party credentials with the per-device key.
///
/// Implementations must authenticate ciphertext: opening with the wrong key
/// or a tampered payload fails with `AgentError::Decryption`.
pub trait CredentialCipher: Send + Sync {
    /// Fresh random device key
    fn generate_key(&self) -> Result<EncryptionKey>;

    fn encrypt(&self, plaintext: &[u8], key: &EncryptionKey) -> Result<Vec<u8>>;

    fn decrypt(&self, ciphertext: &[u8], key: &EncryptionKey) -> Result<Vec<u8>>;

    /// Text form of [`CredentialCipher::encrypt`] used on the wire
    fn encrypt_text(&self, plaintext: &str, key: &EncryptionKey) -> Result<String>;

    /// Text form of [`CredentialCipher::decrypt`]
    fn decrypt_text(&self, sealed: &str, key: &EncryptionKey) -> Result<String>;
}

/// Checks submitted credentials against the live third-party system.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    /// Returns `AgentError::Validation` when the system rejects the
    /// credentials.
    async fn validate(&self, integration: &IntegrationAuthorization) -> Result<()>;
}
