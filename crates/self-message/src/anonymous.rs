//! Anonymous message wrapper for QR transport.
//!
//! Wraps a content envelope for out-of-band delivery: not tied to any
//! group session, carried as a compact string inside a QR code.
//!
//! # Wire Format
//!
//! `self://msg/{base64(bincode(wire))}` where the wire layout is:
//! - flags: u64 bitmask
//! - content: encoded [`Content`] envelope
//!
//! # Invariants
//!
//! - `decode(encode(m)) == m`
//! - decode never allocates more than [`PAYLOAD_BYTES_MAX`] for the payload

use crate::content::Content;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use self_core::{Result, SelfError};
use serde::{Deserialize, Serialize};

/// URI prefix of the encoded form.
pub const ANONYMOUS_MESSAGE_PREFIX: &str = "self://msg/";

/// Flag marking a message targeting the sandbox environment.
pub const FLAG_TARGET_SANDBOX: u64 = 1;

/// Maximum encoded payload size in bytes.
///
/// Prevents unbounded allocations during decode; also comfortably above
/// what fits in a scannable QR code.
pub const PAYLOAD_BYTES_MAX: usize = 64 * 1024; // 64 KiB

#[derive(Serialize, Deserialize)]
struct AnonymousWire {
    flags: u64,
    #[serde(with = "serde_bytes")]
    content: Vec<u8>,
}

/// A content envelope wrapped for out-of-band transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnonymousMessage {
    content: Content,
    flags: u64,
}

impl AnonymousMessage {
    /// Wrap a content envelope with no flags set.
    pub fn new(content: Content) -> Self {
        Self { content, flags: 0 }
    }

    /// Set or clear the sandbox-target flag.
    pub fn target_sandbox(mut self, sandbox: bool) -> Self {
        if sandbox {
            self.flags |= FLAG_TARGET_SANDBOX;
        } else {
            self.flags &= !FLAG_TARGET_SANDBOX;
        }
        self
    }

    /// The wrapped envelope.
    pub fn content(&self) -> &Content {
        &self.content
    }

    /// The flag bitmask.
    pub fn flags(&self) -> u64 {
        self.flags
    }

    /// Whether the sandbox-target flag is set.
    pub fn is_target_sandbox(&self) -> bool {
        self.flags & FLAG_TARGET_SANDBOX != 0
    }

    /// Encode to the compact string form.
    pub fn encode(&self) -> Result<String> {
        let wire = AnonymousWire {
            flags: self.flags,
            content: self.content.encode()?,
        };
        let encoded =
            bincode::serialize(&wire).map_err(|e| SelfError::serialization(e.to_string()))?;
        Ok(format!("{ANONYMOUS_MESSAGE_PREFIX}{}", BASE64.encode(encoded)))
    }

    /// Decode the compact string form.
    pub fn decode(encoded: &str) -> Result<Self> {
        let payload = encoded
            .strip_prefix(ANONYMOUS_MESSAGE_PREFIX)
            .ok_or_else(|| SelfError::invalid_qr_code("missing anonymous message prefix"))?;

        let bytes = BASE64
            .decode(payload)
            .map_err(|e| SelfError::invalid_qr_code(format!("base64: {e}")))?;

        if bytes.len() > PAYLOAD_BYTES_MAX {
            return Err(SelfError::invalid_qr_code("payload exceeds size limit"));
        }

        let wire: AnonymousWire = bincode::deserialize(&bytes)
            .map_err(|e| SelfError::invalid_qr_code(format!("payload: {e}")))?;

        Ok(Self {
            content: Content::decode(&wire.content)?,
            flags: wire.flags,
        })
    }

    /// Render as a QR code using unicode block characters.
    pub fn unicode(&self) -> Result<String> {
        use qrcode::render::unicode;

        let code = qrcode::QrCode::new(self.encode()?)
            .map_err(|e| SelfError::invalid_qr_code(format!("qr generation: {e}")))?;

        Ok(code
            .render::<unicode::Dense1x2>()
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark)
            .build())
    }

    /// Render as a QR code SVG document.
    pub fn svg(&self) -> Result<String> {
        use qrcode::render::svg;

        let code = qrcode::QrCode::new(self.encode()?)
            .map_err(|e| SelfError::invalid_qr_code(format!("qr generation: {e}")))?;

        Ok(code
            .render::<svg::Color>()
            .min_dimensions(256, 256)
            .dark_color(svg::Color("#000000"))
            .light_color(svg::Color("#ffffff"))
            .build())
    }
}
