//! Encryption domain models
//!
//! A ciphertext blob is stored as text: `hex(nonce):hex(ciphertext || tag)`.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::result::{Error, Result};

/// AES-256 key length in bytes
pub const KEY_LEN: usize = 32;

/// AES-GCM nonce length in bytes (96 bits)
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes
pub const TAG_LEN: usize = 16;

const SEPARATOR: char = ':';

/// Encoded output of the field cipher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CipherBlob(String);

impl CipherBlob {
    /// Build a blob from a nonce and the sealed bytes (ciphertext with tag appended)
    pub fn from_parts(nonce: &[u8; NONCE_LEN], sealed: &[u8]) -> Self {
        Self(format!("{}{}{}", hex::encode(nonce), SEPARATOR, hex::encode(sealed)))
    }

    /// Wrap a stored value without checking its shape
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Split into nonce and sealed bytes
    pub fn parts(&self) -> Result<([u8; NONCE_LEN], Vec<u8>)> {
        let (nonce_hex, sealed_hex) = self
            .0
            .split_once(SEPARATOR)
            .ok_or_else(|| Error::Decryption("missing nonce separator".to_string()))?;

        let nonce_bytes = hex::decode(nonce_hex)
            .map_err(|e| Error::Decryption(format!("invalid nonce encoding: {}", e)))?;
        let nonce: [u8; NONCE_LEN] = nonce_bytes
            .try_into()
            .map_err(|_| Error::Decryption("invalid nonce length".to_string()))?;

        let sealed = hex::decode(sealed_hex)
            .map_err(|e| Error::Decryption(format!("invalid ciphertext encoding: {}", e)))?;
        if sealed.len() < TAG_LEN {
            return Err(Error::Decryption("ciphertext too short".to_string()));
        }

        Ok((nonce, sealed))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for CipherBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a supplied password is checked against a stored master password.
///
/// Chosen by attempting decryption of the stored value first. Accounts
/// created before encryption was introduced hold the password as plain text
/// and fall back to `LegacyPlaintext`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretComparison {
    /// Stored value decrypted to this plaintext
    Encrypted(Zeroizing<String>),
    /// Stored value could not be decrypted; compare it as-is
    LegacyPlaintext(Zeroizing<String>),
}

impl SecretComparison {
    /// Exact comparison against the supplied plaintext
    pub fn matches(&self, supplied: &str) -> bool {
        match self {
            SecretComparison::Encrypted(plain) => plain.as_str() == supplied,
            SecretComparison::LegacyPlaintext(raw) => raw.as_str() == supplied,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, SecretComparison::LegacyPlaintext(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_parts() {
        let nonce = [7u8; NONCE_LEN];
        let sealed = vec![1u8; TAG_LEN + 3];
        let blob = CipherBlob::from_parts(&nonce, &sealed);

        assert!(blob.as_str().contains(':'));
        let (n, s) = blob.parts().unwrap();
        assert_eq!(n, nonce);
        assert_eq!(s, sealed);
    }

    #[test]
    fn test_plaintext_is_not_a_blob() {
        assert!(CipherBlob::from_stored("password123").parts().is_err());
        assert!(CipherBlob::from_stored("abcd:zz").parts().is_err());
        assert!(CipherBlob::from_stored("00ff:00ff").parts().is_err());
    }

    #[test]
    fn test_secret_comparison() {
        let enc = SecretComparison::Encrypted(Zeroizing::new("hunter22".to_string()));
        assert!(enc.matches("hunter22"));
        assert!(!enc.matches("hunter2"));
        assert!(!enc.is_legacy());

        let legacy = SecretComparison::LegacyPlaintext(Zeroizing::new("oldpassword".to_string()));
        assert!(legacy.matches("oldpassword"));
        assert!(!legacy.matches("OldPassword"));
        assert!(legacy.is_legacy());
    }
}
