//! Account pairing payloads.

use crate::content::{ContentType, MessageContent};
use crate::status::ResponseStatus;
use crate::types::credential_exchange::ObjectRef;
use self_core::PublicKey;
use self_identity::Operation;
use serde::{Deserialize, Serialize};

/// Request to pair an account, granting roles to `address`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountPairingRequestContent {
    /// The signing address to be granted
    pub address: PublicKey,
    /// Role mask requested for the address
    pub roles: u64,
    /// Unix seconds after which the request should not be answered
    pub expires: i64,
}

impl MessageContent for AccountPairingRequestContent {
    const CONTENT_TYPE: ContentType = ContentType::AccountPairingRequest;
}

/// Response to a pairing request, carrying the identity operation that
/// performs the grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountPairingResponseContent {
    /// Id of the request envelope being answered
    #[serde(with = "serde_bytes")]
    pub response_to: Vec<u8>,
    /// Outcome status
    pub status: ResponseStatus,
    /// The signed identity operation, absent on rejection
    pub operation: Option<Operation>,
    /// Supporting assets
    pub assets: Vec<ObjectRef>,
}

impl MessageContent for AccountPairingResponseContent {
    const CONTENT_TYPE: ContentType = ContentType::AccountPairingResponse;
}
