//! One-time activation and reset codes.
//!
//! Codes are 6 random digits. Only the SHA-256 hash is stored on the account,
//! so a database leak doesn't expose usable codes.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a fresh 6-digit code.
pub fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..6)
        .map(|_| rng.random_range(0..10).to_string())
        .collect()
}

/// Hash a code for storage or comparison.
pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare a submitted code against the stored hash.
pub fn code_matches(code: &str, stored_hash: Option<&str>) -> bool {
    stored_hash.is_some_and(|stored| stored == hash_code(code))
}
