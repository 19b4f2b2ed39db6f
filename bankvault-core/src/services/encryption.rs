//! Encryption service - field-level encryption at rest
//!
//! Uses AES-256-GCM with a single process-wide key. Every call to
//! `encrypt` draws a fresh random nonce, so equal plaintexts never produce
//! equal blobs.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use zeroize::{Zeroize, Zeroizing};

use crate::domain::encryption::{CipherBlob, SecretComparison, KEY_LEN, NONCE_LEN};
use crate::domain::result::{Error, Result};

/// Symmetric cipher for stored fields
pub struct FieldCipher {
    key: [u8; KEY_LEN],
}

impl FieldCipher {
    /// Create a cipher from raw key bytes
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Parse a configured key: either exactly 32 characters used as raw
    /// bytes, or 64 hex characters.
    pub fn from_config_key(key: &str) -> Result<Self> {
        let bytes = if key.len() == KEY_LEN * 2 && key.chars().all(|c| c.is_ascii_hexdigit()) {
            hex::decode(key).map_err(|e| Error::config(format!("invalid hex key: {}", e)))?
        } else {
            key.as_bytes().to_vec()
        };

        let mut key_bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
            Error::config(format!(
                "encryption key must be {} bytes (or {} hex characters), got {} bytes",
                KEY_LEN,
                KEY_LEN * 2,
                b.len()
            ))
        })?;

        let cipher = Self::new(key_bytes);
        key_bytes.zeroize();
        Ok(cipher)
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new((&self.key).into())
    }

    /// Encrypt a plaintext string into a blob
    pub fn encrypt(&self, plaintext: &str) -> Result<CipherBlob> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let sealed = self
            .cipher()
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| Error::Encryption(e.to_string()))?;

        Ok(CipherBlob::from_parts(&nonce_bytes, &sealed))
    }

    /// Encrypt an optional form value, skipping blanks
    pub fn encrypt_provided(&self, value: &str) -> Result<Option<CipherBlob>> {
        crate::domain::bank::provided(value)
            .map(|v| self.encrypt(v))
            .transpose()
    }

    /// Decrypt a blob produced by `encrypt`.
    ///
    /// Fails with `Error::Decryption` when the blob is malformed, was sealed
    /// under another key, or does not decode to UTF-8.
    pub fn decrypt(&self, blob: &CipherBlob) -> Result<String> {
        let (nonce_bytes, sealed) = blob.parts()?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let plaintext = self
            .cipher()
            .decrypt(nonce, sealed.as_slice())
            .map_err(|_| Error::Decryption("authentication failed".to_string()))?;

        String::from_utf8(plaintext).map_err(|_| Error::Decryption("invalid UTF-8".to_string()))
    }

    /// Whether `blob` decrypts under this key. The plaintext is wiped
    /// before returning.
    pub fn is_ciphertext(&self, blob: &CipherBlob) -> bool {
        self.decrypt(blob).map(Zeroizing::new).is_ok()
    }

    /// Pick the comparison strategy for a stored master password.
    /// Only authentication paths call this.
    pub fn comparison_for(&self, stored: &CipherBlob) -> SecretComparison {
        match self.decrypt(stored) {
            Ok(plain) => SecretComparison::Encrypted(Zeroizing::new(plain)),
            Err(_) => {
                SecretComparison::LegacyPlaintext(Zeroizing::new(stored.as_str().to_string()))
            }
        }
    }
}

impl Drop for FieldCipher {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}
