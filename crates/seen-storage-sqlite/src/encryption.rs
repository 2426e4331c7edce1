//! Database encryption key material

use crate::{Error, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

/// Key length in bytes (AES-256)
pub const KEY_LEN: usize = 32;

/// Algorithm a stored key was provisioned for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAlgorithm {
    /// Raw 256-bit SQLCipher page key (current). SQLCipher pages are
    /// AES-256-CBC with an HMAC-SHA512 tag per page.
    SqlcipherRaw,
    /// Keys provisioned by earlier releases
    Legacy,
}

impl KeyAlgorithm {
    /// Stable name
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyAlgorithm::SqlcipherRaw => "sqlcipher_raw",
            KeyAlgorithm::Legacy => "legacy",
        }
    }
}

/// 256-bit symmetric key, zeroized on drop
#[derive(Clone)]
pub struct SymmetricKey(Zeroizing<[u8; KEY_LEN]>);

impl SymmetricKey {
    /// Generate a fresh random key
    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut key[..]);
        Self(key)
    }

    /// Create from raw key bytes
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Create from raw key bytes slice
    pub fn from_bytes_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_LEN {
            return Err(Error::Encryption("Invalid key length".to_string()));
        }
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    /// Parse from hex
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            hex::decode(encoded).map_err(|e| Error::Encryption(format!("Invalid key hex: {}", e)))?,
        );
        Self::from_bytes_slice(&bytes)
    }

    /// Get key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Hex encoding, used as the SQLCipher passphrase
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(&self.0[..]))
    }

    /// Short non-secret identifier for logs
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.0[..]);
        hex::encode(&digest[..4])
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymmetricKey({})", self.fingerprint())
    }
}
