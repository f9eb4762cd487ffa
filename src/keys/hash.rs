//! Hash functions used by key derivation and request signing.

use hmac::{Hmac, Mac};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};

use crate::error::KeyError;

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

/// Double SHA-256, the Bitcoin message and checksum hash.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// RIPEMD-160(SHA-256(data)), used for key fingerprints.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let mut hasher = Ripemd160::new();
    hasher.update(sha256(data));
    let mut out = [0u8; 20];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// HMAC-SHA512 keyed with `key`.
pub fn hmac_sha512(key: &[u8], data: &[u8]) -> Result<[u8; 64], KeyError> {
    let mut mac =
        Hmac::<Sha512>::new_from_slice(key).map_err(|e| KeyError::Hmac(e.to_string()))?;
    mac.update(data);
    let mut out = [0u8; 64];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// Lowercase hex SHA-256 of a request body, as sent in `auth_hash`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}
