//! # Self Message
//!
//! The typed message envelope model: a [`Content`] envelope carrying a
//! 32-byte id, a stable content-type tag and an opaque payload, plus one
//! typed payload struct per content type, response status codes, and the
//! anonymous wrapper used for QR transport.
//!
//! Request/response linkage is by envelope id: the hex-encoded id of a
//! request envelope is the request id a response names in its
//! `response_to` field.

pub mod anonymous;
pub mod content;
pub mod status;
pub mod types;

pub use anonymous::{AnonymousMessage, FLAG_TARGET_SANDBOX};
pub use content::{Content, ContentType, MessageContent};
pub use status::ResponseStatus;
pub use types::chat::{Attachment, ChatContent};
pub use types::credential_exchange::{
    ComparisonOperator, ComparisonParameter, CredentialPresentationRequestContent,
    CredentialPresentationResponseContent, CredentialVerificationRequestContent,
    CredentialVerificationResponseContent, Evidence, ObjectRef, PresentationDetail,
};
pub use types::discovery::{DiscoveryRequestContent, DiscoveryResponseContent};
pub use types::introduction::IntroductionContent;
pub use types::pairing::{AccountPairingRequestContent, AccountPairingResponseContent};

/// Text form of an account pairing QR code.
pub fn pairing_qr_text(code: &str) -> String {
    format!("SELF_PAIRING:{code}")
}
