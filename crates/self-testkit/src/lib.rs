//! # Self Testkit
//!
//! An in-memory implementation of the account primitive plus fixtures
//! for integration tests: a process-local network routing messages
//! between accounts by inbox address, real ed25519 signing for
//! credential and presentation issue, and recording of token-store
//! calls for assertions.
//!
//! Nothing here touches disk or network; two clients constructed over
//! accounts sharing one [`MemoryNetwork`] exchange messages end to end.

pub mod fixtures;
pub mod memory_account;

pub use memory_account::{MemoryAccount, MemoryNetwork, TokenRecord};
