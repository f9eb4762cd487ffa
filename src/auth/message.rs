//! Bitcoin Signed Message: compact recoverable signatures over a prefixed,
//! double-SHA-256 message hash, base64 encoded.

use base64::Engine;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};

use crate::error::AuthError;
use crate::keys::hash::sha256d;

const MAGIC: &[u8] = b"Bitcoin Signed Message:\n";

/// Header byte offset for compact signatures; `+4` marks a compressed key.
const COMPACT_HEADER_BASE: u8 = 27;
const COMPRESSED_FLAG: u8 = 4;

/// Hash signed by [`sign_message`]: `sha256d(varint(24) || magic || varint(len) || message)`.
pub fn message_hash(message: &[u8]) -> [u8; 32] {
    let mut buf = Vec::with_capacity(MAGIC.len() + message.len() + 10);
    write_varint(&mut buf, MAGIC.len() as u64);
    buf.extend_from_slice(MAGIC);
    write_varint(&mut buf, message.len() as u64);
    buf.extend_from_slice(message);
    sha256d(&buf)
}

/// Sign `message`, returning the base64 compact signature.
pub fn sign_message(key: &SigningKey, message: &[u8]) -> Result<String, AuthError> {
    let hash = message_hash(message);
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(&hash)
        .map_err(|e| AuthError::SigningFailed(e.to_string()))?;

    let mut compact = [0u8; 65];
    compact[0] = COMPACT_HEADER_BASE + recovery_id.to_byte() + COMPRESSED_FLAG;
    compact[1..].copy_from_slice(&signature.to_bytes());
    Ok(base64::engine::general_purpose::STANDARD.encode(compact))
}

/// Recover the public key that produced `signature` over `message`.
pub fn recover_public_key(signature: &str, message: &[u8]) -> Result<VerifyingKey, AuthError> {
    let compact = base64::engine::general_purpose::STANDARD
        .decode(signature.trim())
        .map_err(|_| AuthError::InvalidSignature)?;
    if compact.len() != 65 {
        return Err(AuthError::InvalidSignature);
    }

    let header = compact[0];
    if !(COMPACT_HEADER_BASE..COMPACT_HEADER_BASE + 8).contains(&header) {
        return Err(AuthError::InvalidSignature);
    }
    let recovery_id = RecoveryId::from_byte((header - COMPACT_HEADER_BASE) & 3)
        .ok_or(AuthError::InvalidSignature)?;
    let signature = Signature::from_slice(&compact[1..]).map_err(|_| AuthError::InvalidSignature)?;

    VerifyingKey::recover_from_prehash(&message_hash(message), &signature, recovery_id)
        .map_err(|_| AuthError::InvalidSignature)
}

/// Check that `signature` over `message` was produced by `key`.
pub fn verify_message(
    key: &VerifyingKey,
    signature: &str,
    message: &[u8],
) -> Result<(), AuthError> {
    let recovered = recover_public_key(signature, message)?;
    if &recovered == key {
        Ok(())
    } else {
        Err(AuthError::InvalidSignature)
    }
}

fn write_varint(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}
