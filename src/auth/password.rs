//! Salted SHA-256 password hashing.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Fresh random salt for a new account.
pub fn generate_salt() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Lowercase hex SHA-256 of `salt || password`.
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Recompute and compare against the stored hash.
pub fn verify_password(salt: &str, password: &str, expected_hash: &str) -> bool {
    let actual = hash_password(salt, password);
    // Length is fixed (64 hex chars); fold so the comparison does not stop early.
    actual.len() == expected_hash.len()
        && actual
            .bytes()
            .zip(expected_hash.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
