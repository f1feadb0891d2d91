//! Deterministic credential fakes
//!
//! `TaggedCipher` is not encryption: it prefixes the payload with a tag
//! derived from the key so tests can observe key mismatches.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use async_trait::async_trait;
use tidewater_core::{CredentialCipher, CredentialValidator};
use tidewater_domain::events::IntegrationAuthorization;
use tidewater_domain::{AgentError, EncryptionKey, Result};

#[derive(Default)]
pub struct TaggedCipher {
    next_key: AtomicU8,
    seals: AtomicUsize,
}

impl TaggedCipher {
    pub fn seals(&self) -> usize {
        self.seals.load(Ordering::SeqCst)
    }

    fn tag(key: &EncryptionKey) -> String {
        format!("k{}", key.as_bytes()[0])
    }
}

impl CredentialCipher for TaggedCipher {
    fn generate_key(&self) -> Result<EncryptionKey> {
        let seed = self.next_key.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        Ok(EncryptionKey::from_bytes([seed; 32]))
    }

    fn encrypt(&self, plaintext: &[u8], key: &EncryptionKey) -> Result<Vec<u8>> {
        self.seals.fetch_add(1, Ordering::SeqCst);
        let mut sealed = Self::tag(key).into_bytes();
        sealed.push(b':');
        sealed.extend_from_slice(plaintext);
        Ok(sealed)
    }

    fn decrypt(&self, ciphertext: &[u8], key: &EncryptionKey) -> Result<Vec<u8>> {
        let mut prefix = Self::tag(key).into_bytes();
        prefix.push(b':');
        ciphertext
            .strip_prefix(prefix.as_slice())
            .map(<[u8]>::to_vec)
            .ok_or_else(|| AgentError::Decryption("key mismatch".into()))
    }

    fn encrypt_text(&self, plaintext: &str, key: &EncryptionKey) -> Result<String> {
        let sealed = self.encrypt(plaintext.as_bytes(), key)?;
        String::from_utf8(sealed).map_err(|e| AgentError::Internal(e.to_string()))
    }

    fn decrypt_text(&self, sealed: &str, key: &EncryptionKey) -> Result<String> {
        let plain = self.decrypt(sealed.as_bytes(), key)?;
        String::from_utf8(plain).map_err(|e| AgentError::Decryption(e.to_string()))
    }
}

/// Accepts everything except a `"token": "bad"` credential.
#[derive(Default)]
pub struct TokenValidator {
    /// Fail with a transport error instead of a validation error
    pub unreachable: bool,
}

#[async_trait]
impl CredentialValidator for TokenValidator {
    async fn validate(&self, integration: &IntegrationAuthorization) -> Result<()> {
        if self.unreachable {
            return Err(AgentError::Transport("connection refused".into()));
        }
        if integration.authorization.get("token").and_then(|v| v.as_str()) == Some("bad") {
            return Err(AgentError::Validation("401 Unauthorized".into()));
        }
        Ok(())
    }
}
