//! Account primitive configuration.

use serde::{Deserialize, Serialize};

/// Log verbosity handed down to the account primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Errors and warnings
    #[default]
    Warn,
    /// Informational
    Info,
    /// Debugging detail
    Debug,
    /// Everything
    Trace,
}

impl LogLevel {
    /// The equivalent tracing level.
    pub fn as_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Configuration handed to the account primitive at startup.
///
/// Built by the client facade from its own validated configuration; the
/// storage contents behind `storage_path` are opaque to the SDK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// 32-byte key encrypting local storage
    #[serde(with = "serde_bytes")]
    pub storage_key: Vec<u8>,
    /// Directory holding the primitive's encrypted state
    pub storage_path: String,
    /// RPC endpoint
    pub rpc_url: String,
    /// Object store endpoint
    pub object_url: String,
    /// Messaging endpoint
    pub message_url: String,
    /// Log verbosity
    pub log_level: LogLevel,
    /// Skip waiting for transport readiness at startup
    pub skip_ready: bool,
    /// Skip first-run account setup
    pub skip_setup: bool,
}
