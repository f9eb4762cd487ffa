//! Request signatures: `auth_*` header values derived from a body and a key.
//!
//! For an xpriv, the signing key is a child derived along the path encoded by
//! the request nonce, and the signed message starts with the root xpub. For an
//! access key, the key signs directly and the message starts with its
//! compressed public key in hex. Both then append the body hash, the nonce and
//! the millisecond timestamp.

use chrono::Utc;
use k256::ecdsa::{SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::message::{sign_message, verify_message};
use super::{
    AuthHeaders, AUTH_ACCESS_KEY, AUTH_HEADER, AUTH_HEADER_HASH, AUTH_HEADER_NONCE,
    AUTH_HEADER_TIME, AUTH_SIGNATURE,
};
use crate::error::{AuthError, BuxError, KeyError};
use crate::keys::hash::sha256_hex;
use crate::keys::ExtendedKey;

/// Number of random bytes in `auth_nonce`.
const NONCE_LEN: usize = 32;

/// The values a verifier needs to authenticate one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    pub auth_hash: String,
    pub auth_nonce: String,
    pub auth_time: i64,
    pub signature: String,
}

impl AuthPayload {
    /// The header set carrying this payload.
    pub fn to_headers(&self) -> AuthHeaders {
        let mut headers = AuthHeaders::default();
        if let Some(xpub) = &self.xpub {
            headers.push(AUTH_HEADER, xpub.clone());
        }
        if let Some(access_key) = &self.access_key {
            headers.push(AUTH_ACCESS_KEY, access_key.clone());
        }
        headers.push(AUTH_HEADER_HASH, self.auth_hash.clone());
        headers.push(AUTH_HEADER_NONCE, self.auth_nonce.clone());
        headers.push(AUTH_HEADER_TIME, self.auth_time.to_string());
        headers.push(AUTH_SIGNATURE, self.signature.clone());
        headers
    }

    /// Read a payload back from received request headers.
    ///
    /// Returns `None` when any signature header is missing or malformed.
    pub fn from_header_map(headers: &reqwest::header::HeaderMap) -> Option<Self> {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Some(Self {
            xpub: get(AUTH_HEADER),
            access_key: get(AUTH_ACCESS_KEY),
            auth_hash: get(AUTH_HEADER_HASH)?,
            auth_nonce: get(AUTH_HEADER_NONCE)?,
            auth_time: get(AUTH_HEADER_TIME)?.parse().ok()?,
            signature: get(AUTH_SIGNATURE)?,
        })
    }
}

/// Sign `body` with an xpriv.
pub fn create_signature(xpriv: &ExtendedKey, body: &str) -> Result<AuthPayload, BuxError> {
    create_signature_with(xpriv, body, &random_nonce(), Utc::now().timestamp_millis())
}

pub(crate) fn create_signature_with(
    xpriv: &ExtendedKey,
    body: &str,
    nonce: &str,
    auth_time: i64,
) -> Result<AuthPayload, BuxError> {
    if !xpriv.is_private() {
        return Err(AuthError::MissingXPriv.into());
    }
    let xpub = xpriv.neuter().to_string();
    let child = xpriv.derive_from_hex(nonce)?;
    let signing_key = child.signing_key().ok_or(AuthError::MissingXPriv)?;

    let auth_hash = sha256_hex(body.as_bytes());
    let message = signing_message(&xpub, &auth_hash, nonce, auth_time);
    let signature = sign_message(signing_key, message.as_bytes())?;

    Ok(AuthPayload {
        xpub: Some(xpub),
        access_key: None,
        auth_hash,
        auth_nonce: nonce.to_string(),
        auth_time,
        signature,
    })
}

/// Sign `body` with an access key.
pub fn create_access_key_signature(key: &SigningKey, body: &str) -> Result<AuthPayload, BuxError> {
    create_access_key_signature_with(key, body, &random_nonce(), Utc::now().timestamp_millis())
}

pub(crate) fn create_access_key_signature_with(
    key: &SigningKey,
    body: &str,
    nonce: &str,
    auth_time: i64,
) -> Result<AuthPayload, BuxError> {
    let access_key = hex::encode(key.verifying_key().to_encoded_point(true).as_bytes());
    let auth_hash = sha256_hex(body.as_bytes());
    let message = signing_message(&access_key, &auth_hash, nonce, auth_time);
    let signature = sign_message(key, message.as_bytes())?;

    Ok(AuthPayload {
        xpub: None,
        access_key: Some(access_key),
        auth_hash,
        auth_nonce: nonce.to_string(),
        auth_time,
        signature,
    })
}

/// `<identifier><auth_hash><auth_nonce><auth_time>`
pub fn signing_message(identifier: &str, auth_hash: &str, nonce: &str, auth_time: i64) -> String {
    format!("{}{}{}{}", identifier, auth_hash, nonce, auth_time)
}

/// Verify `payload` against the body that was actually received.
///
/// Checks the body hash first, then re-derives the signing public key from
/// the identifier in the payload and checks the signature.
pub fn verify_signature(payload: &AuthPayload, body: &str) -> Result<(), AuthError> {
    if sha256_hex(body.as_bytes()) != payload.auth_hash {
        return Err(AuthError::HashMismatch);
    }

    let (identifier, key) = match (&payload.xpub, &payload.access_key) {
        (Some(xpub), _) => {
            let root: ExtendedKey = xpub.parse().map_err(|_| AuthError::InvalidSignature)?;
            let child = root
                .neuter()
                .derive_from_hex(&payload.auth_nonce)
                .map_err(|_| AuthError::InvalidSignature)?;
            (xpub.as_str(), child.verifying_key())
        }
        (None, Some(access_key)) => {
            let key = parse_public_key(access_key).map_err(|_| AuthError::InvalidSignature)?;
            (access_key.as_str(), key)
        }
        (None, None) => return Err(AuthError::MissingXPub),
    };

    let message = signing_message(
        identifier,
        &payload.auth_hash,
        &payload.auth_nonce,
        payload.auth_time,
    );
    verify_message(&key, &payload.signature, message.as_bytes())
}

/// Parse a hex-encoded access key (raw 32-byte secp256k1 private key).
pub fn parse_access_key(hex_key: &str) -> Result<SigningKey, KeyError> {
    let bytes = hex::decode(hex_key.trim())?;
    SigningKey::from_slice(&bytes).map_err(|e| KeyError::InvalidPrivateKey(e.to_string()))
}

fn parse_public_key(hex_key: &str) -> Result<VerifyingKey, KeyError> {
    let bytes = hex::decode(hex_key.trim())?;
    VerifyingKey::from_sec1_bytes(&bytes).map_err(|e| KeyError::InvalidPublicKey(e.to_string()))
}

fn random_nonce() -> String {
    let mut bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Network;

    const NONCE: &str = "0d1c2b3a4f5e6d7c8b9aa9b8c7d6e5f40123456789abcdef0fedcba987654321";
    const BODY: &str = r#"{"query":"mutation { destination { id } }","variables":{}}"#;

    fn xpriv() -> ExtendedKey {
        ExtendedKey::from_seed(&[42u8; 32], Network::Mainnet).unwrap()
    }

    #[test]
    fn test_signature_verifies() {
        let payload = create_signature(&xpriv(), BODY).unwrap();
        assert_eq!(payload.xpub, Some(xpriv().neuter().to_string()));
        assert_eq!(payload.auth_nonce.len(), 64);
        assert!(verify_signature(&payload, BODY).is_ok());
    }

    #[test]
    fn test_fixed_inputs_are_deterministic() {
        let a = create_signature_with(&xpriv(), BODY, NONCE, 1_700_000_000_000).unwrap();
        let b = create_signature_with(&xpriv(), BODY, NONCE, 1_700_000_000_000).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.auth_hash, sha256_hex(BODY.as_bytes()));
    }

    #[test]
    fn test_nonces_are_fresh() {
        let a = create_signature(&xpriv(), BODY).unwrap();
        let b = create_signature(&xpriv(), BODY).unwrap();
        assert_ne!(a.auth_nonce, b.auth_nonce);
        assert_ne!(a.signature, b.signature);
    }

    #[test]
    fn test_every_single_byte_tamper_is_detected() {
        let payload = create_signature(&xpriv(), BODY).unwrap();
        let bytes = BODY.as_bytes();
        for i in 0..bytes.len() {
            let mut tampered = bytes.to_vec();
            tampered[i] ^= 0x01;
            let tampered = String::from_utf8_lossy(&tampered);
            assert!(verify_signature(&payload, &tampered).is_err(), "byte {} not detected", i);
        }
    }

    #[test]
    fn test_rehashed_tamper_fails_signature() {
        let mut payload = create_signature(&xpriv(), BODY).unwrap();
        let tampered = BODY.replace("destination", "destinatioN");
        payload.auth_hash = sha256_hex(tampered.as_bytes());
        assert_eq!(
            verify_signature(&payload, &tampered),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn test_other_xpub_fails() {
        let mut payload = create_signature(&xpriv(), BODY).unwrap();
        let other = ExtendedKey::from_seed(&[7u8; 32], Network::Mainnet).unwrap();
        payload.xpub = Some(other.neuter().to_string());
        assert_eq!(
            verify_signature(&payload, BODY),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn test_changed_time_fails() {
        let mut payload = create_signature(&xpriv(), BODY).unwrap();
        payload.auth_time += 1;
        assert!(verify_signature(&payload, BODY).is_err());
    }

    #[test]
    fn test_public_key_cannot_sign() {
        let err = create_signature(&xpriv().neuter(), BODY).unwrap_err();
        assert!(matches!(err, BuxError::Auth(AuthError::MissingXPriv)));
    }

    #[test]
    fn test_access_key_signature_verifies() {
        let key = parse_access_key(&"11".repeat(32)).unwrap();
        let payload = create_access_key_signature(&key, BODY).unwrap();
        assert!(payload.xpub.is_none());
        assert_eq!(payload.access_key.as_ref().map(String::len), Some(66));
        assert!(verify_signature(&payload, BODY).is_ok());
        assert_eq!(
            verify_signature(&payload, "{}"),
            Err(AuthError::HashMismatch)
        );
    }

    #[test]
    fn test_empty_body_signs_empty_string() {
        let payload = create_signature(&xpriv(), "").unwrap();
        assert_eq!(payload.auth_hash, sha256_hex(b""));
        assert!(verify_signature(&payload, "").is_ok());
    }

    #[test]
    fn test_headers_round_trip() {
        let payload = create_signature(&xpriv(), BODY).unwrap();
        let headers = payload.to_headers();

        let mut map = reqwest::header::HeaderMap::new();
        for (name, value) in headers.iter() {
            map.insert(
                reqwest::header::HeaderName::from_static(name),
                reqwest::header::HeaderValue::from_str(value).unwrap(),
            );
        }
        assert_eq!(AuthPayload::from_header_map(&map), Some(payload));
    }

    #[test]
    fn test_signing_message_layout() {
        assert_eq!(signing_message("xpub1", "abc", "00ff", 12), "xpub1abc00ff12");
    }

    #[test]
    fn test_invalid_access_key() {
        assert!(parse_access_key("zz").is_err());
        assert!(parse_access_key(&"00".repeat(32)).is_err());
    }
}
