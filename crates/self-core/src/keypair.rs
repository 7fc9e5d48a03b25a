//! Typed public keys and their address encoding.
//!
//! Every participant on the network is identified by a signing address: a
//! one-byte algorithm tag followed by 32 key bytes, rendered as 66 lowercase
//! hex characters. Exchange keys share the same encoding with a different
//! tag.
//!
//! # Invariants
//!
//! - `PublicKey::from_address(key.address())` round-trips, tag included
//! - `PublicKey::from_bytes(key.to_bytes())` round-trips
//! - the string form is always lowercase hex

use ed25519_dalek::{Signer, Verifier};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Length of the canonical encoded key: tag byte plus 32 key bytes.
pub const ADDRESS_BYTES: usize = 33;

/// Length of the canonical string form.
pub const ADDRESS_CHARS: usize = ADDRESS_BYTES * 2;

/// Algorithm tag carried in the first byte of every encoded key.
///
/// Values are stable wire constants and must not be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum KeyAlgorithm {
    /// Ed25519 signing key
    Ed25519 = 0x01,
    /// Curve25519 key-agreement key
    Curve25519 = 0x02,
}

impl KeyAlgorithm {
    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(Self::Ed25519),
            0x02 => Some(Self::Curve25519),
            _ => None,
        }
    }
}

/// A typed public key: algorithm tag plus 32 raw key bytes.
///
/// Logically value-typed; freely copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey {
    algorithm: KeyAlgorithm,
    bytes: [u8; 32],
}

impl PublicKey {
    /// Construct from an algorithm tag and raw key bytes.
    pub fn new(algorithm: KeyAlgorithm, bytes: [u8; 32]) -> Self {
        Self { algorithm, bytes }
    }

    /// Parse the canonical 66-character hex string form.
    ///
    /// Returns `None` for anything that is not a well-formed address:
    /// wrong length, non-hex characters, or an unknown algorithm tag.
    pub fn from_address(address: &str) -> Option<Self> {
        if address.len() != ADDRESS_CHARS {
            return None;
        }

        let decoded = hex::decode(address).ok()?;
        Self::from_bytes(&decoded).ok()
    }

    /// Decode the canonical 33-byte form.
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        if bytes.len() != ADDRESS_BYTES {
            return Err(crate::SelfError::invalid(format!(
                "public key must be {ADDRESS_BYTES} bytes, got {}",
                bytes.len()
            )));
        }

        let algorithm = KeyAlgorithm::from_tag(bytes[0]).ok_or_else(|| {
            crate::SelfError::invalid(format!("unknown key algorithm tag {:#04x}", bytes[0]))
        })?;

        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes[1..]);

        Ok(Self {
            algorithm,
            bytes: key,
        })
    }

    /// The canonical 33-byte encoding: tag byte then key bytes.
    pub fn to_bytes(&self) -> [u8; ADDRESS_BYTES] {
        let mut out = [0u8; ADDRESS_BYTES];
        out[0] = self.algorithm as u8;
        out[1..].copy_from_slice(&self.bytes);
        out
    }

    /// The canonical string form: 66 lowercase hex characters.
    pub fn address(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// The algorithm tag.
    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// The raw 32 key bytes, without the tag.
    pub fn raw_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Whether this key identifies the same party as `other`.
    pub fn matches(&self, other: &PublicKey) -> bool {
        self == other
    }

    /// Verify an ed25519 signature over `message`.
    ///
    /// Always false for non-signing keys or malformed signatures.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        if self.algorithm != KeyAlgorithm::Ed25519 {
            return false;
        }

        let Ok(verifying_key) = ed25519_dalek::VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };

        let Ok(sig_bytes) = <&[u8; 64]>::try_from(signature.as_bytes()) else {
            return false;
        };

        verifying_key
            .verify(message, &ed25519_dalek::Signature::from_bytes(sig_bytes))
            .is_ok()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address())
    }
}

// Serialized as the canonical 33-byte form so every wire encoding sees the
// same layout the string form is derived from.
impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.to_bytes())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let bytes = serde_bytes::ByteBuf::deserialize(deserializer)?;
        PublicKey::from_bytes(&bytes).map_err(D::Error::custom)
    }
}

/// A detached ed25519 signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "serde_bytes")] Vec<u8>);

impl Signature {
    /// Wrap raw signature bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The raw signature bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// An ed25519 signing keypair.
///
/// The SDK core only signs inside the identity operation builder and the
/// test fixtures; production credential signing goes through the account
/// primitive, which holds its keys behind the storage boundary.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

impl KeyPair {
    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        let mut secret = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut secret);
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(&secret),
        }
    }

    /// Reconstruct from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(&seed),
        }
    }

    /// The public half, tagged as a signing key.
    pub fn public(&self) -> PublicKey {
        PublicKey::new(
            KeyAlgorithm::Ed25519,
            self.signing_key.verifying_key().to_bytes(),
        )
    }

    /// Sign `message`, producing a detached signature.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes().to_vec())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public().address())
            .finish_non_exhaustive()
    }
}
