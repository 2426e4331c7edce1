//! PIN hashing and verification
//!
//! Stored form is `hex(salt || SHA-256(salt || utf8(pin)))` with a fresh
//! 32-byte salt per hash. The PIN gates access; it is not key material.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Salt length in bytes
pub const SALT_LEN: usize = 32;

/// SHA-256 output length in bytes
pub const DIGEST_LEN: usize = 32;

/// Shortest accepted PIN
pub const MIN_PIN_LEN: usize = 4;

/// Longest accepted PIN
pub const MAX_PIN_LEN: usize = 6;

/// Generate secure random salt
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

fn salted_digest(salt: &[u8], pin: &str) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(pin.as_bytes());
    hasher.finalize().into()
}

/// Hash a PIN with a fresh random salt
pub fn hash_pin(pin: &str) -> String {
    let salt = generate_salt();
    let digest = salted_digest(&salt, pin);

    let mut stored = Vec::with_capacity(SALT_LEN + DIGEST_LEN);
    stored.extend_from_slice(&salt);
    stored.extend_from_slice(&digest);
    hex::encode(stored)
}

/// Check a PIN against a stored hash. Malformed hashes never verify.
pub fn verify_pin(pin: &str, stored_hash: &str) -> bool {
    let Ok(bytes) = hex::decode(stored_hash.trim()) else {
        return false;
    };
    if bytes.len() <= SALT_LEN {
        return false;
    }

    let (salt, expected) = bytes.split_at(SALT_LEN);
    salted_digest(salt, pin).as_slice().ct_eq(expected).into()
}

/// True iff `pin` is 4 to 6 ASCII digits
pub fn is_valid_pin(pin: &str) -> bool {
    (MIN_PIN_LEN..=MAX_PIN_LEN).contains(&pin.len()) && pin.bytes().all(|b| b.is_ascii_digit())
}
