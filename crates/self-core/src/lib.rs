//! # Self Core
//!
//! Shared primitives for the Self SDK: the unified error type, typed public
//! keys and their address encoding, the claim value tree used by verifiable
//! credentials, and wire timestamp helpers.
//!
//! Everything in this crate is a pure data layer. Network, storage and group
//! cryptography live behind the account primitive interface in
//! `self-account`; orchestration lives in `self-sdk`.

pub mod claims;
pub mod errors;
pub mod keypair;
pub mod time;

pub use claims::{ClaimMap, ClaimValue};
pub use errors::{Result, SelfError};
pub use keypair::{KeyAlgorithm, KeyPair, PublicKey, Signature};
pub use time::{from_unix, now, to_unix, Timestamp};
