//! Credential exchange payloads: presentation and verification flows.

use crate::content::{ContentType, MessageContent};
use crate::status::ResponseStatus;
use self_credentials::{VerifiableCredential, VerifiablePresentation};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Comparison operator for presentation detail parameters.
///
/// Tags are stable wire constants and must not be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    /// Field equals value
    Equals,
    /// Field differs from value
    NotEquals,
    /// Field is less than value
    LessThan,
    /// Field is greater than value
    GreaterThan,
    /// Field is less than or equal to value
    LessOrEqual,
    /// Field is greater than or equal to value
    GreaterOrEqual,
}

impl ComparisonOperator {
    /// The wire tag.
    pub fn tag(&self) -> u8 {
        match self {
            ComparisonOperator::Equals => 0,
            ComparisonOperator::NotEquals => 1,
            ComparisonOperator::LessThan => 2,
            ComparisonOperator::GreaterThan => 3,
            ComparisonOperator::LessOrEqual => 4,
            ComparisonOperator::GreaterOrEqual => 5,
        }
    }

    /// Resolve a wire tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ComparisonOperator::Equals),
            1 => Some(ComparisonOperator::NotEquals),
            2 => Some(ComparisonOperator::LessThan),
            3 => Some(ComparisonOperator::GreaterThan),
            4 => Some(ComparisonOperator::LessOrEqual),
            5 => Some(ComparisonOperator::GreaterOrEqual),
            _ => None,
        }
    }
}

impl Serialize for ComparisonOperator {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.tag())
    }
}

impl<'de> Deserialize<'de> for ComparisonOperator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let tag = u8::deserialize(deserializer)?;
        ComparisonOperator::from_tag(tag)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown comparison operator {tag}")))
    }
}

/// One constraint on a requested credential field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonParameter {
    /// How the field is compared
    pub operator: ComparisonOperator,
    /// The claim field the constraint applies to
    pub field: String,
    /// The comparison value
    pub value: String,
}

/// One requested credential shape within a presentation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationDetail {
    /// Acceptable credential type list
    pub credential_type: Vec<String>,
    /// Constraints on the credential's claims
    pub parameters: Vec<ComparisonParameter>,
}

/// Wire reference to a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Object id in the object store
    #[serde(with = "serde_bytes")]
    pub id: Vec<u8>,
    /// Content hash of the plaintext
    #[serde(with = "serde_bytes")]
    pub hash: Vec<u8>,
    /// Mime type
    pub mime: String,
    /// Decryption key material, when shared
    pub key: Option<Vec<u8>>,
}

/// Evidence attached to a verification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// What the object evidences (e.g. `"terms"`)
    pub evidence_type: String,
    /// The evidencing object
    pub object: ObjectRef,
}

/// Request for a credential presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialPresentationRequestContent {
    /// Requested presentation type list
    pub presentation_type: Vec<String>,
    /// Requested credential shapes
    pub details: Vec<PresentationDetail>,
    /// Presentations proving the requester's own standing
    pub proof: Vec<VerifiablePresentation>,
    /// Unix seconds after which the request should not be answered
    pub expires: i64,
}

impl MessageContent for CredentialPresentationRequestContent {
    const CONTENT_TYPE: ContentType = ContentType::CredentialPresentationRequest;
}

/// Response to a presentation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialPresentationResponseContent {
    /// Id of the request envelope being answered
    #[serde(with = "serde_bytes")]
    pub response_to: Vec<u8>,
    /// Outcome status
    pub status: ResponseStatus,
    /// Presented credentials, empty on rejection
    pub presentations: Vec<VerifiablePresentation>,
}

impl MessageContent for CredentialPresentationResponseContent {
    const CONTENT_TYPE: ContentType = ContentType::CredentialPresentationResponse;
}

/// Request for credential verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialVerificationRequestContent {
    /// Credential type list to verify against
    pub credential_type: Vec<String>,
    /// Evidence objects supporting the request
    pub evidence: Vec<Evidence>,
    /// Presentations proving the requester's own standing
    pub proof: Vec<VerifiablePresentation>,
    /// Unix seconds after which the request should not be answered
    pub expires: i64,
}

impl MessageContent for CredentialVerificationRequestContent {
    const CONTENT_TYPE: ContentType = ContentType::CredentialVerificationRequest;
}

/// Response to a verification request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialVerificationResponseContent {
    /// Id of the request envelope being answered
    #[serde(with = "serde_bytes")]
    pub response_to: Vec<u8>,
    /// Outcome status
    pub status: ResponseStatus,
    /// Verified credentials, empty on rejection
    pub credentials: Vec<VerifiableCredential>,
}

impl MessageContent for CredentialVerificationResponseContent {
    const CONTENT_TYPE: ContentType = ContentType::CredentialVerificationResponse;
}
