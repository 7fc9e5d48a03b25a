//! Chat message payload.

use crate::content::{ContentType, MessageContent};
use serde::{Deserialize, Serialize};

/// Reference to an uploaded attachment object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Display name
    pub name: String,
    /// Mime type
    pub mime: String,
    /// Object id in the object store
    #[serde(with = "serde_bytes")]
    pub object_id: Vec<u8>,
}

/// A chat message, optionally replying to an earlier envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatContent {
    /// Message text
    pub message: String,
    /// Id of the envelope this message replies to
    pub referencing: Option<Vec<u8>>,
    /// Attachment references; accepted and carried, unused in v1
    pub attachments: Vec<Attachment>,
}

impl ChatContent {
    /// A plain message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            referencing: None,
            attachments: Vec::new(),
        }
    }

    /// A reply to the envelope with id `referencing`.
    pub fn reply(message: impl Into<String>, referencing: Vec<u8>) -> Self {
        Self {
            message: message.into(),
            referencing: Some(referencing),
            attachments: Vec::new(),
        }
    }
}

impl MessageContent for ChatContent {
    const CONTENT_TYPE: ContentType = ContentType::Chat;
}
