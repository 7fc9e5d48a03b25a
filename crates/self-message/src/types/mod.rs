//! Typed payloads, one module per wire content family.

pub mod chat;
pub mod credential_exchange;
pub mod discovery;
pub mod introduction;
pub mod pairing;
