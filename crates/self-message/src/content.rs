//! Content envelopes and the content-type table.
//!
//! # Invariants
//!
//! - envelope ids are 32 random bytes, unique per built envelope
//! - the hex-encoded id doubles as the request id for correlation
//! - content-type tags are stable wire constants and must not be reused
//! - `Content::decode(content.encode())` round-trips

use self_core::{Result, SelfError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Stable content-type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// Out-of-band discovery request (QR)
    DiscoveryRequest,
    /// Response to a discovery request
    DiscoveryResponse,
    /// Chat message
    Chat,
    /// Request for a credential presentation
    CredentialPresentationRequest,
    /// Response carrying presentations
    CredentialPresentationResponse,
    /// Request for credential verification
    CredentialVerificationRequest,
    /// Response carrying verified credentials
    CredentialVerificationResponse,
    /// Request to pair an account
    AccountPairingRequest,
    /// Response carrying a pairing operation
    AccountPairingResponse,
    /// Introduction tokens for future messaging
    Introduction,
    /// Anything this SDK version does not know; ignored by dispatch
    Unknown(u16),
}

impl ContentType {
    /// The wire tag.
    pub fn tag(&self) -> u16 {
        match self {
            ContentType::DiscoveryRequest => 1,
            ContentType::DiscoveryResponse => 2,
            ContentType::Chat => 3,
            ContentType::CredentialPresentationRequest => 4,
            ContentType::CredentialPresentationResponse => 5,
            ContentType::CredentialVerificationRequest => 6,
            ContentType::CredentialVerificationResponse => 7,
            ContentType::AccountPairingRequest => 8,
            ContentType::AccountPairingResponse => 9,
            ContentType::Introduction => 10,
            ContentType::Unknown(tag) => *tag,
        }
    }

    /// Resolve a wire tag.
    pub fn from_tag(tag: u16) -> Self {
        match tag {
            1 => ContentType::DiscoveryRequest,
            2 => ContentType::DiscoveryResponse,
            3 => ContentType::Chat,
            4 => ContentType::CredentialPresentationRequest,
            5 => ContentType::CredentialPresentationResponse,
            6 => ContentType::CredentialVerificationRequest,
            7 => ContentType::CredentialVerificationResponse,
            8 => ContentType::AccountPairingRequest,
            9 => ContentType::AccountPairingResponse,
            10 => ContentType::Introduction,
            other => ContentType::Unknown(other),
        }
    }
}

impl Serialize for ContentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.tag())
    }
}

impl<'de> Deserialize<'de> for ContentType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(ContentType::from_tag(u16::deserialize(deserializer)?))
    }
}

/// A typed content envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    id: [u8; 32],
    content_type: ContentType,
    #[serde(with = "serde_bytes")]
    content: Vec<u8>,
}

impl Content {
    /// Build an envelope with a fresh random id.
    pub fn new(content_type: ContentType, content: Vec<u8>) -> Self {
        Self {
            id: rand::random(),
            content_type,
            content,
        }
    }

    /// Build an envelope with a caller-chosen id.
    ///
    /// Ids must be unique per sent envelope; this constructor exists for
    /// tests and for re-encoding received envelopes.
    pub fn with_id(id: [u8; 32], content_type: ContentType, content: Vec<u8>) -> Self {
        Self {
            id,
            content_type,
            content,
        }
    }

    /// The 32-byte envelope id.
    pub fn id(&self) -> &[u8; 32] {
        &self.id
    }

    /// The hex-encoded id, used as request id for correlation.
    pub fn request_id(&self) -> String {
        hex::encode(self.id)
    }

    /// The content-type tag.
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// The opaque payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.content
    }

    /// Canonical wire encoding.
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| SelfError::serialization(e.to_string()))
    }

    /// Decode a wire envelope.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| SelfError::serialization(format!("content decode: {e}")))
    }
}

/// A typed payload that travels inside a [`Content`] envelope.
pub trait MessageContent: Serialize + DeserializeOwned + Sized {
    /// The content type this payload encodes as.
    const CONTENT_TYPE: ContentType;

    /// Wrap into an envelope with a fresh id.
    fn into_content(self) -> Result<Content> {
        let payload =
            bincode::serialize(&self).map_err(|e| SelfError::serialization(e.to_string()))?;
        Ok(Content::new(Self::CONTENT_TYPE, payload))
    }

    /// Decode from an envelope, checking the content-type tag.
    fn from_content(content: &Content) -> Result<Self> {
        if content.content_type() != Self::CONTENT_TYPE {
            return Err(SelfError::invalid(format!(
                "expected content type {:?}, got {:?}",
                Self::CONTENT_TYPE,
                content.content_type()
            )));
        }

        bincode::deserialize(content.payload())
            .map_err(|e| SelfError::serialization(format!("payload decode: {e}")))
    }
}
