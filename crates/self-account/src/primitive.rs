//! The account primitive interface.
//!
//! Everything the orchestration layer needs from the underlying account
//! library: inbox lifecycle, connection bootstrap, message send, object
//! store, credential signing, pairing codes, token and key/value storage,
//! and the inbound event stream.
//!
//! Implementations must be internally thread-safe; the SDK shares one
//! primitive across all subsystems.

use crate::config::AccountConfig;
use crate::object::Object;
use self_core::{PublicKey, Result, Timestamp};
use self_credentials::{
    UnsignedCredential, UnsignedPresentation, VerifiableCredential, VerifiablePresentation,
};
use self_message::Content;
use tokio::sync::mpsc;

/// An event delivered by the account primitive.
///
/// Events may originate on background worker threads; the SDK consumes
/// them through a single ordered stream per account.
#[derive(Debug)]
pub enum AccountEvent {
    /// Transport connected
    Connect,
    /// Transport disconnected
    Disconnect {
        /// Reason reported by the transport, when known
        reason: Option<String>,
    },
    /// A group welcome arrived; accepting it yields a group address
    Welcome {
        /// The sending peer's signing address
        from: PublicKey,
        /// Opaque welcome payload
        welcome: Vec<u8>,
    },
    /// A key package arrived; establishing yields a group address
    KeyPackage {
        /// The sending peer's signing address
        from: PublicKey,
        /// Opaque key package payload
        package: Vec<u8>,
    },
    /// A decrypted message arrived
    Message {
        /// The sending peer's signing address
        from: PublicKey,
        /// The receiving inbox address
        to: PublicKey,
        /// The decrypted content envelope
        content: Content,
    },
}

/// The account primitive consumed by the SDK core.
///
/// The methods mirror the native library's surface one to one; the SDK
/// adds orchestration (dispatch, correlation, lifecycle) on top and
/// nothing below.
#[async_trait::async_trait]
pub trait AccountPrimitive: Send + Sync {
    /// Configure the primitive. Called once, before `inbox_open`.
    async fn configure(&self, config: &AccountConfig) -> Result<()>;

    /// Open the inbox, returning its signing address.
    async fn inbox_open(&self) -> Result<PublicKey>;

    /// Take the inbound event stream.
    ///
    /// There is exactly one consumer (the SDK dispatcher); a second call
    /// fails.
    fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<AccountEvent>>;

    /// Negotiate an out-of-band key package for `address`, valid until
    /// `expires`.
    async fn connection_negotiate_out_of_band(
        &self,
        address: &PublicKey,
        expires: Timestamp,
    ) -> Result<Vec<u8>>;

    /// Accept a group welcome, returning the group address.
    async fn connection_accept(&self, to: &PublicKey, welcome: &[u8]) -> Result<PublicKey>;

    /// Establish a connection from a received key package, returning the
    /// group address.
    async fn connection_establish(&self, to: &PublicKey, key_package: &[u8])
        -> Result<PublicKey>;

    /// Negotiate a connection between two addresses.
    async fn connection_negotiate(
        &self,
        from: &PublicKey,
        to: &PublicKey,
        expires: Timestamp,
    ) -> Result<()>;

    /// Send a content envelope to `to` over the established session.
    async fn message_send(&self, to: &PublicKey, content: &Content) -> Result<()>;

    /// Upload an object, encrypting unless `encrypted` is already true.
    async fn object_upload(&self, object: &mut Object, encrypted: bool) -> Result<()>;

    /// Download and decrypt an object's data into `object`.
    async fn object_download(&self, object: &mut Object) -> Result<()>;

    /// Sign an unsigned credential.
    async fn credential_issue(
        &self,
        unsigned: &UnsignedCredential,
    ) -> Result<VerifiableCredential>;

    /// Sign an unsigned presentation.
    async fn presentation_issue(
        &self,
        unsigned: &UnsignedPresentation,
    ) -> Result<VerifiablePresentation>;

    /// Send a push-notification summary to `to`.
    async fn notification_send(&self, to: &PublicKey, summary: &str) -> Result<()>;

    /// The account's pairing code and whether it is still unpaired.
    async fn sdk_pairing_code(&self) -> Result<(String, bool)>;

    /// Persist an introduction token for messaging `from` within `group`.
    async fn token_store(
        &self,
        from: &PublicKey,
        to: &PublicKey,
        group: &PublicKey,
        token: &[u8],
    ) -> Result<()>;

    /// Store a value under `key`.
    async fn value_store(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Store a value under `key`, expiring at `expires`.
    async fn value_store_with_expiry(
        &self,
        key: &str,
        value: &[u8],
        expires: Timestamp,
    ) -> Result<()>;

    /// Look up the value under `key`.
    async fn value_lookup(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove the value under `key`.
    async fn value_remove(&self, key: &str) -> Result<()>;

    /// Shut the primitive down. Idempotent.
    async fn close(&self) -> Result<()>;
}
