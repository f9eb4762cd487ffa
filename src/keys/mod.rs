//! BIP32 extended keys (xpriv / xpub) over secp256k1.
//!
//! Only what the client needs to identify itself and sign requests:
//! parsing and serializing extended keys, master-key generation, child
//! derivation (private and public), and neutering an xpriv into its xpub.

pub mod hash;

use std::fmt;
use std::str::FromStr;

use k256::ecdsa::{SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::group::Curve;
use k256::elliptic_curve::PrimeField;
use k256::{ProjectivePoint, Scalar};
use rand::RngCore;

use crate::error::KeyError;
use hash::{hash160, hmac_sha512};

/// Index at and above which a child is hardened.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Serialized length of an extended key, without the base58 checksum.
const SERIALIZED_LEN: usize = 78;

const MASTER_HMAC_KEY: &[u8] = b"Bitcoin seed";

const MAINNET_PRIVATE: [u8; 4] = [0x04, 0x88, 0xad, 0xe4];
const MAINNET_PUBLIC: [u8; 4] = [0x04, 0x88, 0xb2, 0x1e];
const TESTNET_PRIVATE: [u8; 4] = [0x04, 0x35, 0x83, 0x94];
const TESTNET_PUBLIC: [u8; 4] = [0x04, 0x35, 0x87, 0xcf];

/// Network an extended key is encoded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    fn version(self, private: bool) -> [u8; 4] {
        match (self, private) {
            (Network::Mainnet, true) => MAINNET_PRIVATE,
            (Network::Mainnet, false) => MAINNET_PUBLIC,
            (Network::Testnet, true) => TESTNET_PRIVATE,
            (Network::Testnet, false) => TESTNET_PUBLIC,
        }
    }

    fn from_version(version: [u8; 4]) -> Result<(Self, bool), KeyError> {
        match version {
            MAINNET_PRIVATE => Ok((Network::Mainnet, true)),
            MAINNET_PUBLIC => Ok((Network::Mainnet, false)),
            TESTNET_PRIVATE => Ok((Network::Testnet, true)),
            TESTNET_PUBLIC => Ok((Network::Testnet, false)),
            other => Err(KeyError::UnknownVersion(hex::encode(other))),
        }
    }
}

#[derive(Clone)]
enum KeyMaterial {
    Private(SigningKey),
    Public(VerifyingKey),
}

/// A BIP32 extended key, private or public.
#[derive(Clone)]
pub struct ExtendedKey {
    network: Network,
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: u32,
    chain_code: [u8; 32],
    key: KeyMaterial,
}

impl ExtendedKey {
    /// Master key from a seed of 16 to 64 bytes.
    pub fn from_seed(seed: &[u8], network: Network) -> Result<Self, KeyError> {
        if !(16..=64).contains(&seed.len()) {
            return Err(KeyError::InvalidSeed(seed.len()));
        }
        let i = hmac_sha512(MASTER_HMAC_KEY, seed)?;
        let (il, ir) = i.split_at(32);
        let signing = SigningKey::from_slice(il)
            .map_err(|e| KeyError::InvalidPrivateKey(e.to_string()))?;

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(ir);

        Ok(Self {
            network,
            depth: 0,
            parent_fingerprint: [0; 4],
            child_number: 0,
            chain_code,
            key: KeyMaterial::Private(signing),
        })
    }

    /// Fresh master xpriv from 32 bytes of OS randomness.
    pub fn generate(network: Network) -> Result<Self, KeyError> {
        let mut seed = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut seed);
        Self::from_seed(&seed, network)
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn child_number(&self) -> u32 {
        self.child_number
    }

    pub fn parent_fingerprint(&self) -> [u8; 4] {
        self.parent_fingerprint
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub fn is_private(&self) -> bool {
        matches!(self.key, KeyMaterial::Private(_))
    }

    /// The private signing key, if this is an xpriv.
    pub fn signing_key(&self) -> Option<&SigningKey> {
        match &self.key {
            KeyMaterial::Private(sk) => Some(sk),
            KeyMaterial::Public(_) => None,
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        match &self.key {
            KeyMaterial::Private(sk) => sk.verifying_key().clone(),
            KeyMaterial::Public(vk) => vk.clone(),
        }
    }

    /// Compressed SEC1 public key.
    pub fn public_key_bytes(&self) -> [u8; 33] {
        compressed(&self.verifying_key())
    }

    /// First four bytes of HASH160 of the public key.
    pub fn fingerprint(&self) -> [u8; 4] {
        let h = hash160(&self.public_key_bytes());
        [h[0], h[1], h[2], h[3]]
    }

    /// The public (xpub) counterpart of this key.
    pub fn neuter(&self) -> ExtendedKey {
        ExtendedKey {
            key: KeyMaterial::Public(self.verifying_key()),
            ..self.clone()
        }
    }

    /// Derive the child at `index`. Hardened indices require an xpriv.
    pub fn derive_child(&self, index: u32) -> Result<ExtendedKey, KeyError> {
        if self.depth == u8::MAX {
            return Err(KeyError::DepthExceeded);
        }
        let hardened = index >= HARDENED_OFFSET;

        let mut data = Vec::with_capacity(37);
        match (&self.key, hardened) {
            (KeyMaterial::Private(sk), true) => {
                data.push(0);
                data.extend_from_slice(&sk.to_bytes());
            }
            (KeyMaterial::Public(_), true) => return Err(KeyError::HardenedFromPublic),
            (_, false) => data.extend_from_slice(&self.public_key_bytes()),
        }
        data.extend_from_slice(&index.to_be_bytes());

        let i = hmac_sha512(&self.chain_code, &data)?;
        let (il, ir) = i.split_at(32);
        let tweak = scalar_from_slice(il).ok_or(KeyError::InvalidChild(index))?;

        let key = match &self.key {
            KeyMaterial::Private(sk) => {
                let parent: Scalar = *sk.as_nonzero_scalar().as_ref();
                let child = tweak + parent;
                let child = SigningKey::from_bytes(&child.to_repr())
                    .map_err(|_| KeyError::InvalidChild(index))?;
                KeyMaterial::Private(child)
            }
            KeyMaterial::Public(vk) => {
                let point =
                    ProjectivePoint::GENERATOR * tweak + ProjectivePoint::from(*vk.as_affine());
                let child = VerifyingKey::from_affine(point.to_affine())
                    .map_err(|_| KeyError::InvalidChild(index))?;
                KeyMaterial::Public(child)
            }
        };

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(ir);

        Ok(ExtendedKey {
            network: self.network,
            depth: self.depth + 1,
            parent_fingerprint: self.fingerprint(),
            child_number: index,
            chain_code,
            key,
        })
    }

    /// Derive along a sequence of child indices.
    pub fn derive_path(&self, path: &[u32]) -> Result<ExtendedKey, KeyError> {
        path.iter()
            .try_fold(self.clone(), |key, index| key.derive_child(*index))
    }

    /// Derive along the path encoded by a hex string (see [`child_numbers_from_hex`]).
    pub fn derive_from_hex(&self, hex_path: &str) -> Result<ExtendedKey, KeyError> {
        self.derive_path(&child_numbers_from_hex(hex_path)?)
    }

    fn serialize(&self) -> [u8; SERIALIZED_LEN] {
        let mut out = [0u8; SERIALIZED_LEN];
        out[0..4].copy_from_slice(&self.network.version(self.is_private()));
        out[4] = self.depth;
        out[5..9].copy_from_slice(&self.parent_fingerprint);
        out[9..13].copy_from_slice(&self.child_number.to_be_bytes());
        out[13..45].copy_from_slice(&self.chain_code);
        match &self.key {
            KeyMaterial::Private(sk) => {
                out[45] = 0;
                out[46..78].copy_from_slice(&sk.to_bytes());
            }
            KeyMaterial::Public(vk) => out[45..78].copy_from_slice(&compressed(vk)),
        }
        out
    }
}

impl FromStr for ExtendedKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let data = bs58::decode(s.trim()).with_check(None).into_vec()?;
        if data.len() != SERIALIZED_LEN {
            return Err(KeyError::InvalidLength(data.len()));
        }

        let mut version = [0u8; 4];
        version.copy_from_slice(&data[0..4]);
        let (network, private) = Network::from_version(version)?;

        let mut parent_fingerprint = [0u8; 4];
        parent_fingerprint.copy_from_slice(&data[5..9]);
        let mut child_number = [0u8; 4];
        child_number.copy_from_slice(&data[9..13]);
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&data[13..45]);

        let key = if private {
            if data[45] != 0 {
                return Err(KeyError::InvalidPrivateKey(
                    "missing zero padding byte".to_string(),
                ));
            }
            let sk = SigningKey::from_slice(&data[46..78])
                .map_err(|e| KeyError::InvalidPrivateKey(e.to_string()))?;
            KeyMaterial::Private(sk)
        } else {
            let vk = VerifyingKey::from_sec1_bytes(&data[45..78])
                .map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?;
            KeyMaterial::Public(vk)
        };

        Ok(ExtendedKey {
            network,
            depth: data[4],
            parent_fingerprint,
            child_number: u32::from_be_bytes(child_number),
            chain_code,
            key,
        })
    }
}

impl fmt::Display for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = bs58::encode(self.serialize()).with_check().into_string();
        write!(f, "{}", encoded)
    }
}

// Never print private material.
impl fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedKey")
            .field("network", &self.network)
            .field("private", &self.is_private())
            .field("depth", &self.depth)
            .field("child_number", &self.child_number)
            .field("public_key", &hex::encode(self.public_key_bytes()))
            .finish()
    }
}

impl PartialEq for ExtendedKey {
    fn eq(&self, other: &Self) -> bool {
        self.serialize() == other.serialize()
    }
}

impl Eq for ExtendedKey {}

/// Split a hex string into 8-character chunks and read each as a child index.
///
/// Values above `i32::MAX` have `i32::MAX` subtracted, which keeps all but
/// `0xffffffff` in the non-hardened range. A trailing short chunk is parsed
/// as-is.
pub fn child_numbers_from_hex(hex_path: &str) -> Result<Vec<u32>, KeyError> {
    const MAX_INT32: u64 = i32::MAX as u64;

    if !hex_path.is_ascii() {
        return Err(KeyError::InvalidHex(hex_path.to_string()));
    }
    hex_path
        .as_bytes()
        .chunks(8)
        .map(|chunk| {
            let chunk = std::str::from_utf8(chunk)
                .map_err(|e| KeyError::InvalidHex(e.to_string()))?;
            let mut num = u64::from_str_radix(chunk, 16)
                .map_err(|e| KeyError::InvalidHex(format!("{}: {}", chunk, e)))?;
            if num > MAX_INT32 {
                num -= MAX_INT32;
            }
            Ok(num as u32)
        })
        .collect()
}

fn compressed(vk: &VerifyingKey) -> [u8; 33] {
    let point = vk.to_encoded_point(true);
    let mut out = [0u8; 33];
    out.copy_from_slice(point.as_bytes());
    out
}

/// Interpret 32 bytes as a scalar, rejecting values at or above the curve order.
fn scalar_from_slice(bytes: &[u8]) -> Option<Scalar> {
    let mut repr = k256::FieldBytes::default();
    repr.copy_from_slice(bytes);
    Option::from(Scalar::from_repr(repr))
}

#[cfg(test)]
mod tests {
    use super::*;

    // BIP32 test vector 1.
    const SEED_1: &str = "000102030405060708090a0b0c0d0e0f";
    const MASTER_XPRV_1: &str = "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi";
    const MASTER_XPUB_1: &str = "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8";

    fn master() -> ExtendedKey {
        let seed = hex::decode(SEED_1).unwrap();
        ExtendedKey::from_seed(&seed, Network::Mainnet).unwrap()
    }

    #[test]
    fn test_master_from_seed_matches_vector() {
        let key = master();
        assert!(key.is_private());
        assert_eq!(key.depth(), 0);
        assert_eq!(key.to_string(), MASTER_XPRV_1);
        assert_eq!(key.neuter().to_string(), MASTER_XPUB_1);
    }

    #[test]
    fn test_parse_round_trips_vector() {
        let xprv: ExtendedKey = MASTER_XPRV_1.parse().unwrap();
        assert_eq!(xprv, master());
        let xpub: ExtendedKey = MASTER_XPUB_1.parse().unwrap();
        assert!(!xpub.is_private());
        assert_eq!(xpub.to_string(), MASTER_XPUB_1);
    }

    #[test]
    fn test_public_derivation_matches_private() {
        let xprv = master();
        let xpub = xprv.neuter();
        let path = [0, 1, 2_147_483_646];
        let from_private = xprv.derive_path(&path).unwrap().neuter();
        let from_public = xpub.derive_path(&path).unwrap();
        assert_eq!(from_private, from_public);
        assert_eq!(from_public.depth(), 3);
        assert_eq!(from_public.child_number(), 2_147_483_646);
    }

    #[test]
    fn test_hardened_from_public_fails() {
        let xpub = master().neuter();
        let err = xpub.derive_child(HARDENED_OFFSET).unwrap_err();
        assert_eq!(err, KeyError::HardenedFromPublic);
        assert!(master().derive_child(HARDENED_OFFSET).is_ok());
    }

    #[test]
    fn test_child_records_parent_fingerprint() {
        let parent = master();
        let child = parent.derive_child(7).unwrap();
        assert_eq!(child.parent_fingerprint(), parent.fingerprint());
        assert_eq!(child.depth(), 1);
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let mut corrupted = MASTER_XPUB_1.to_string();
        corrupted.pop();
        corrupted.push('9');
        assert!(corrupted.parse::<ExtendedKey>().is_err());
    }

    #[test]
    fn test_seed_length_validated() {
        assert_eq!(
            ExtendedKey::from_seed(&[1u8; 8], Network::Mainnet).unwrap_err(),
            KeyError::InvalidSeed(8)
        );
    }

    #[test]
    fn test_testnet_prefixes() {
        let key = ExtendedKey::generate(Network::Testnet).unwrap();
        assert!(key.to_string().starts_with("tprv"));
        assert!(key.neuter().to_string().starts_with("tpub"));
        let parsed: ExtendedKey = key.to_string().parse().unwrap();
        assert_eq!(parsed.network(), Network::Testnet);
    }

    #[test]
    fn test_child_numbers_from_hex() {
        let nums = child_numbers_from_hex("0000000a7fffffff80000000ffffffff").unwrap();
        assert_eq!(nums, vec![10, 0x7fff_ffff, 1, 0x8000_0000]);
    }

    #[test]
    fn test_child_numbers_short_tail() {
        let nums = child_numbers_from_hex("00000001ff").unwrap();
        assert_eq!(nums, vec![1, 255]);
    }

    #[test]
    fn test_child_numbers_invalid_hex() {
        assert!(child_numbers_from_hex("zz").is_err());
    }

    #[test]
    fn test_debug_hides_private_key() {
        let key = master();
        let dbg = format!("{:?}", key);
        assert!(!dbg.contains(MASTER_XPRV_1));
        assert!(dbg.contains("private: true"));
    }
}
