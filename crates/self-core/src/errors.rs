//! Unified error type for the Self SDK.
//!
//! A single enum covers every failure surface of the SDK: configuration,
//! client lifecycle, caller input, request correlation, wrapped account
//! primitive failures, and waiter timeout/cancellation. Subsystems convert
//! their local failures into this type at the public boundary.

use serde::{Deserialize, Serialize};

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, SelfError>;

/// Unified error type for all SDK operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum SelfError {
    /// The client configuration is missing the 32-byte storage key
    #[error("Configuration error: storage key is required")]
    MissingStorageKey,

    /// The client configuration is missing the storage path
    #[error("Configuration error: storage path is required")]
    MissingStoragePath,

    /// The client has been closed; no further operations are possible
    #[error("Client is closed")]
    ClientClosed,

    /// The client has not finished starting up
    #[error("Client is not started")]
    ClientNotStarted,

    /// A peer DID string failed to parse into a signing address
    #[error("Invalid peer DID: {did}")]
    InvalidPeerDid {
        /// The DID string that failed to parse
        did: String,
    },

    /// The caller used the wrong responder for an incoming request
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// What the caller did wrong
        message: String,
    },

    /// A QR payload failed to decode
    #[error("Invalid QR code: {message}")]
    InvalidQrCode {
        /// Why the payload was rejected
        message: String,
    },

    /// No waiter exists for the given request id
    #[error("Request not found: {request_id}")]
    RequestNotFound {
        /// Hex-encoded request id
        request_id: String,
    },

    /// A response did not arrive before the caller's deadline
    #[error("Deadline exceeded waiting for response")]
    Deadline,

    /// The wait was cancelled before a response arrived
    #[error("Wait cancelled")]
    Cancelled,

    /// A builder was finished with a required field unset
    #[error("Incomplete {entity}: missing {field}")]
    Incomplete {
        /// What was being built
        entity: String,
        /// The missing field
        field: String,
    },

    /// Invalid input or state
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// A cryptographic check failed
    #[error("Crypto error: {message}")]
    Crypto {
        /// Error message describing the failed check
        message: String,
    },

    /// Serialization or deserialization failed
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the failure
        message: String,
    },

    /// An opaque failure from the account primitive (transport, storage
    /// or group crypto)
    #[error("Account error: {message}")]
    Account {
        /// Wrapped error message
        message: String,
    },
}

impl SelfError {
    /// Create an invalid peer DID error
    pub fn invalid_peer_did(did: impl Into<String>) -> Self {
        Self::InvalidPeerDid { did: did.into() }
    }

    /// Create an invalid response error
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Create an invalid QR code error
    pub fn invalid_qr_code(message: impl Into<String>) -> Self {
        Self::InvalidQrCode {
            message: message.into(),
        }
    }

    /// Create a request-not-found error
    pub fn request_not_found(request_id: impl Into<String>) -> Self {
        Self::RequestNotFound {
            request_id: request_id.into(),
        }
    }

    /// Create an incomplete-builder error
    pub fn incomplete(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Incomplete {
            entity: entity.into(),
            field: field.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a crypto error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Wrap an account primitive failure
    pub fn account(message: impl Into<String>) -> Self {
        Self::Account {
            message: message.into(),
        }
    }
}
