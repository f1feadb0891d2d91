//! Credential vault
//!
//! AES-256-GCM sealing of third-party credentials with the per-device key.
//! Sealed bytes are `nonce (12) || ciphertext+tag`; the text form is the
//! standard base64 encoding of those bytes.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use tidewater_core::CredentialCipher;
use tidewater_domain::constants::ENCRYPTION_KEY_LEN;
use tidewater_domain::{AgentError, EncryptionKey, Result};

const NONCE_LEN: usize = 12;

/// Stateless [`CredentialCipher`]; the key travels with each call.
#[derive(Debug, Default, Clone, Copy)]
pub struct AesGcmVault;

impl AesGcmVault {
    pub fn new() -> Self {
        Self
    }

    fn cipher(key: &EncryptionKey) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| AgentError::Internal(format!("failed to create cipher: {e}")))
    }
}

impl CredentialCipher for AesGcmVault {
    fn generate_key(&self) -> Result<EncryptionKey> {
        let mut bytes = [0u8; ENCRYPTION_KEY_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| AgentError::Internal(format!("system random source unavailable: {e}")))?;
        Ok(EncryptionKey::from_bytes(bytes))
    }

    fn encrypt(&self, plaintext: &[u8], key: &EncryptionKey) -> Result<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|e| AgentError::Internal(format!("system random source unavailable: {e}")))?;

        let ciphertext = Self::cipher(key)?
            .encrypt(&Nonce::from(nonce), plaintext)
            .map_err(|e| AgentError::Internal(format!("encryption failed: {e}")))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn decrypt(&self, sealed: &[u8], key: &EncryptionKey) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_LEN {
            return Err(AgentError::Decryption(format!(
                "payload of {} bytes is shorter than the nonce",
                sealed.len()
            )));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce: [u8; NONCE_LEN] = nonce
            .try_into()
            .map_err(|_| AgentError::Decryption("nonce must be exactly 12 bytes".into()))?;

        Self::cipher(key)?
            .decrypt(&Nonce::from(nonce), ciphertext)
            .map_err(|_| AgentError::Decryption("authentication tag mismatch".into()))
    }

    fn encrypt_text(&self, plaintext: &str, key: &EncryptionKey) -> Result<String> {
        Ok(BASE64.encode(self.encrypt(plaintext.as_bytes(), key)?))
    }

    fn decrypt_text(&self, sealed: &str, key: &EncryptionKey) -> Result<String> {
        let raw = BASE64
            .decode(sealed.trim())
            .map_err(|e| AgentError::Decryption(format!("payload is not base64: {e}")))?;
        let plaintext = self.decrypt(&raw, key)?;
        String::from_utf8(plaintext)
            .map_err(|_| AgentError::Decryption("plaintext is not valid UTF-8".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_and_open() {
        let vault = AesGcmVault::new();
        let key = vault.generate_key().unwrap();

        let sealed = vault.encrypt(b"token-123", &key).unwrap();
        assert_ne!(&sealed[NONCE_LEN..], b"token-123");
        assert_eq!(vault.decrypt(&sealed, &key).unwrap(), b"token-123");
    }

    #[test]
    fn wrong_key_is_decryption_error() {
        let vault = AesGcmVault::new();
        let k1 = vault.generate_key().unwrap();
        let k2 = vault.generate_key().unwrap();
        assert_ne!(k1, k2);

        let sealed = vault.encrypt_text(r#"{"token":"t"}"#, &k1).unwrap();
        let err = vault.decrypt_text(&sealed, &k2).unwrap_err();
        assert_eq!(err.code(), "decryption_error");
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let vault = AesGcmVault::new();
        let key = vault.generate_key().unwrap();
        let mut sealed = vault.encrypt(b"payload", &key).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;

        assert!(matches!(vault.decrypt(&sealed, &key), Err(AgentError::Decryption(_))));
        assert!(matches!(vault.decrypt(&[1, 2, 3], &key), Err(AgentError::Decryption(_))));
        assert!(matches!(vault.decrypt_text("not base64!", &key), Err(AgentError::Decryption(_))));
    }

    #[test]
    fn nonces_differ_per_call() {
        let vault = AesGcmVault::new();
        let key = EncryptionKey::from_bytes([9; ENCRYPTION_KEY_LEN]);
        let a = vault.encrypt_text("same", &key).unwrap();
        let b = vault.encrypt_text("same", &key).unwrap();
        assert_ne!(a, b);
        assert_eq!(vault.decrypt_text(&a, &key).unwrap(), "same");
    }
}
