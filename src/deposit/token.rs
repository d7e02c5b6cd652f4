//! Per-deposit bearer tokens
//!
//! The raw token goes to the payer once; only its SHA-256 is stored.

use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const TOKEN_BYTES: usize = 32;

/// Raw token (hex) and the hash to persist.
pub fn issue() -> (String, String) {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = hex::encode(bytes);
    let hash = hash(&token);
    (token, hash)
}

pub fn hash(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Hash the presented token and compare in constant time.
pub fn verify(presented: &str, stored_hash: &str) -> bool {
    let candidate = hash(presented);
    candidate.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}
