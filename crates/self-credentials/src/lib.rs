//! # Self Credentials
//!
//! Verifiable credentials and presentations, the trusted issuer registry,
//! and the validity graph that decides which credentials hold for a given
//! holder at a given time.
//!
//! Credentials move through three shapes: a fluent [`CredentialBuilder`],
//! the canonical [`UnsignedCredential`] handed to the account primitive for
//! signing, and the immutable [`VerifiableCredential`]. Presentations
//! mirror the same shape triple.

pub mod credential;
pub mod graph;
pub mod presentation;
pub mod registry;

pub use credential::{CredentialBuilder, UnsignedCredential, VerifiableCredential};
pub use graph::credential_graph_valid_for;
pub use presentation::{PresentationBuilder, UnsignedPresentation, VerifiablePresentation};
pub use registry::{sandbox_trusted_issuer_registry, Authority, TrustedIssuerRegistry};

/// Base type tag present on every verifiable credential.
pub const CREDENTIAL_TYPE_BASE: &str = "VerifiableCredential";

/// Base type tag present on every verifiable presentation.
pub const PRESENTATION_TYPE_BASE: &str = "VerifiablePresentation";
