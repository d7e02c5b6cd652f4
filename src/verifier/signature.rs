//! Keyed-hash helpers shared by the provider verifiers.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;

use super::VerifyError;

pub fn hmac_sha256_hex(secret: &str, data: &str) -> Result<String, VerifyError> {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| VerifyError::InvalidKey)?;
    mac.update(data.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn hmac_sha512_hex(secret: &str, data: &str) -> Result<String, VerifyError> {
    let mut mac =
        Hmac::<Sha512>::new_from_slice(secret.as_bytes()).map_err(|_| VerifyError::InvalidKey)?;
    mac.update(data.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time comparison of a lowercase hex digest against a supplied
/// one. Providers differ in hex casing, so the supplied value is
/// lowercased first.
pub fn digest_matches(expected_lower_hex: &str, supplied: &str) -> bool {
    let supplied = supplied.trim().to_ascii_lowercase();
    expected_lower_hex
        .as_bytes()
        .ct_eq(supplied.as_bytes())
        .into()
}
