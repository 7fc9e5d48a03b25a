//! # Self SDK
//!
//! Client SDK for the Self decentralized, end-to-end encrypted messaging
//! and verifiable-credential network.
//!
//! The [`Client`] facade owns an account primitive (the underlying
//! cryptographic library, behind the [`self_account::AccountPrimitive`]
//! trait) and exposes the orchestration layer on top of it:
//!
//! - [`Discovery`]: out-of-band peer discovery over QR codes
//! - [`Chat`]: end-to-end encrypted chat messages
//! - [`GroupChat`]: string-named groups layered over chat
//! - [`Credentials`]: credential presentation and verification exchange
//! - [`Pairing`]: account pairing codes and pairing requests
//!
//! Every "request and wait" operation correlates on the 32-byte envelope
//! id: responses complete a registered waiter, late and duplicate
//! responses are dropped, and cancellation or timeout always cleans the
//! correlation table.
//!
//! ```ignore
//! let client = Client::new(ClientConfig::new(storage_key, "/tmp/self"), account).await?;
//! let qr = client.discovery().generate_qr().await?;
//! println!("{}", qr.unicode()?);
//! let peer = qr.wait_for_response(Duration::from_secs(60)).await?;
//! client.chat().send(&peer.did, "hello").await?;
//! ```

pub mod chat;
pub mod client;
mod correlation;
pub mod credentials;
pub mod discovery;
pub mod dispatch;
pub mod group_chat;
mod handlers;
pub mod pairing;

pub use chat::{Chat, ChatMessage};
pub use client::{Client, ClientConfig};
pub use correlation::DEFAULT_REQUEST_TIMEOUT;
pub use credentials::{
    Asset, CredentialRequestHandle, CredentialResponse, Credentials, IncomingCredentialRequest,
    PRESENTATION_REQUEST_TYPES,
};
pub use discovery::{DiscoveredPeer, Discovery, DiscoveryQr};
pub use dispatch::{IntroductionEvent, KeyPackageEvent, WelcomeEvent};
pub use group_chat::{GroupChat, GroupMessage};
pub use pairing::{
    IncomingPairingRequest, Pairing, PairingCode, PairingRequestHandle, PairingResponse,
};

// The data-model crates are part of the public API surface.
pub use self_account as account;
pub use self_core as core;
pub use self_credentials as credentials_model;
pub use self_identity as identity;
pub use self_message as message;
