//! # Self Identity
//!
//! Pure data layer for identity documents and the operations that mutate
//! them. A document is a time-indexed keystate: for any `(key, role, at)`
//! query there is a deterministic answer. Operations are ordered lists of
//! actions (grant, modify, revoke, recover, deactivate, plus threshold and
//! weight policy updates) with canonical encoding, content-addressed
//! hashing and detached signatures.
//!
//! Nothing in this crate talks to the network; resolution of a remote
//! document happens behind the [`DocumentResolver`] seam.

pub mod document;
pub mod operation;
pub mod roles;

pub use document::{DocumentResolver, IdentityDocument, KeyState};
pub use operation::{
    Action, ActionKind, ActionSummary, DescriptionKind, EmbeddedDescription, Operation,
    OperationBuilder, ReferenceDescription,
};
pub use roles::{
    role_names, ROLE_ASSERTION, ROLE_AUTHENTICATION, ROLE_DELEGATION, ROLE_INVOCATION,
    ROLE_MESSAGING, ROLE_VERIFICATION,
};
