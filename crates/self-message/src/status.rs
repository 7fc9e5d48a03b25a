//! Response status codes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Status carried by every response envelope.
///
/// Tags are stable wire constants and must not be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseStatus {
    /// Request accepted and fulfilled
    Accepted,
    /// Generic success
    Ok,
    /// A resource was created
    Created,
    /// The request was malformed
    BadRequest,
    /// The requester is not authenticated
    Unauthorized,
    /// The request was understood and refused
    Forbidden,
    /// The referenced entity does not exist
    NotFound,
    /// The request cannot be satisfied as stated
    NotAcceptable,
    /// The request conflicts with current state
    Conflict,
}

impl ResponseStatus {
    /// The wire tag.
    pub fn tag(&self) -> u8 {
        match self {
            ResponseStatus::Accepted => 1,
            ResponseStatus::Ok => 2,
            ResponseStatus::Created => 3,
            ResponseStatus::BadRequest => 4,
            ResponseStatus::Unauthorized => 5,
            ResponseStatus::Forbidden => 6,
            ResponseStatus::NotFound => 7,
            ResponseStatus::NotAcceptable => 8,
            ResponseStatus::Conflict => 9,
        }
    }

    /// Resolve a wire tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(ResponseStatus::Accepted),
            2 => Some(ResponseStatus::Ok),
            3 => Some(ResponseStatus::Created),
            4 => Some(ResponseStatus::BadRequest),
            5 => Some(ResponseStatus::Unauthorized),
            6 => Some(ResponseStatus::Forbidden),
            7 => Some(ResponseStatus::NotFound),
            8 => Some(ResponseStatus::NotAcceptable),
            9 => Some(ResponseStatus::Conflict),
            _ => None,
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResponseStatus::Accepted => "accepted",
            ResponseStatus::Ok => "ok",
            ResponseStatus::Created => "created",
            ResponseStatus::BadRequest => "bad request",
            ResponseStatus::Unauthorized => "unauthorized",
            ResponseStatus::Forbidden => "forbidden",
            ResponseStatus::NotFound => "not found",
            ResponseStatus::NotAcceptable => "not acceptable",
            ResponseStatus::Conflict => "conflict",
        };
        f.write_str(name)
    }
}

impl Serialize for ResponseStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.tag())
    }
}

impl<'de> Deserialize<'de> for ResponseStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let tag = u8::deserialize(deserializer)?;
        ResponseStatus::from_tag(tag)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown response status {tag}")))
    }
}
