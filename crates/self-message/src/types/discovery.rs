//! Discovery payloads: out-of-band key-package negotiation.

use crate::content::{ContentType, MessageContent};
use serde::{Deserialize, Serialize};

/// Out-of-band discovery request, carried inside a QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRequestContent {
    /// Key package for bootstrapping an encrypted session
    #[serde(with = "serde_bytes")]
    pub key_package: Vec<u8>,
    /// Unix seconds after which the request should not be answered
    pub expires: i64,
}

impl MessageContent for DiscoveryRequestContent {
    const CONTENT_TYPE: ContentType = ContentType::DiscoveryRequest;
}

/// Response to a discovery request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryResponseContent {
    /// Id of the discovery request envelope being answered
    #[serde(with = "serde_bytes")]
    pub response_to: Vec<u8>,
}

impl MessageContent for DiscoveryResponseContent {
    const CONTENT_TYPE: ContentType = ContentType::DiscoveryResponse;
}
