//! Account credential encryption.
//!
//! AES-256-GCM with a key derived from the process-wide ENCRYPTION_KEY
//! (SHA-256 of the configured secret). Stored form is base64(nonce || ciphertext),
//! so the same password encrypts to a different string every time.

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, bail, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};

const NONCE_SIZE: usize = 12;

#[derive(Clone)]
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl CredentialCipher {
    pub fn new(encryption_key: &str) -> Self {
        let digest = Sha256::digest(encryption_key.as_bytes());
        let key: [u8; 32] = digest.into();
        Self {
            cipher: Aes256Gcm::new(&key.into()),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        if plaintext.is_empty() {
            bail!("cannot encrypt empty credential");
        }

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        use aes_gcm::aead::rand_core::RngCore;
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| anyhow!("encryption failed: {e}"))?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(&combined))
    }

    pub fn decrypt(&self, encrypted: &str) -> Result<String> {
        if encrypted.is_empty() {
            bail!("cannot decrypt empty credential");
        }

        let combined = BASE64
            .decode(encrypted)
            .map_err(|e| anyhow!("invalid base64 credential: {e}"))?;
        if combined.len() < NONCE_SIZE {
            bail!("encrypted credential too short: {} bytes", combined.len());
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext_bytes = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| anyhow!("decryption failed (wrong key or corrupted data): {e}"))?;

        String::from_utf8(plaintext_bytes)
            .map_err(|e| anyhow!("decrypted credential is not valid UTF-8: {e}"))
    }
}
