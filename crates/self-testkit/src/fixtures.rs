//! Shared fixtures for identity and credential tests.

use self_core::{ClaimValue, KeyPair, PublicKey, Timestamp};
use self_credentials::{
    CredentialBuilder, PresentationBuilder, TrustedIssuerRegistry, VerifiableCredential,
    VerifiablePresentation,
};
use self_identity::{IdentityDocument, ROLE_ASSERTION, ROLE_INVOCATION, ROLE_MESSAGING};

/// A 32-byte storage key for client configs.
pub fn storage_key() -> Vec<u8> {
    rand::random::<[u8; 32]>().to_vec()
}

/// A genesis document for `owner` granting itself assertion, invocation
/// and messaging from `at`.
pub fn genesis_document(owner: &KeyPair, at: Timestamp) -> IdentityDocument {
    let mut document = IdentityDocument::new(owner.public());
    let operation = document
        .create()
        .timestamp(at)
        .grant_embedded(
            owner.public(),
            ROLE_ASSERTION | ROLE_INVOCATION | ROLE_MESSAGING,
        )
        .sign_with(owner)
        .finish()
        .unwrap_or_else(|e| panic!("genesis operation: {e}"));

    document
        .apply(&operation)
        .unwrap_or_else(|e| panic!("genesis apply: {e}"));
    document
}

/// A registry trusting `issuer` for `credential_types` from the epoch,
/// with the issuer's genesis document attached.
pub fn registry_trusting(
    issuer: &KeyPair,
    credential_types: &[&str],
) -> TrustedIssuerRegistry {
    let mut registry = TrustedIssuerRegistry::new();
    registry.add_issuer(issuer.public());
    registry.add_issuer_document(genesis_document(issuer, self_core::from_unix(0)));

    for credential_type in credential_types {
        registry
            .grant_authority(
                &issuer.public(),
                *credential_type,
                self_core::from_unix(0),
                None,
            )
            .unwrap_or_else(|e| panic!("grant authority: {e}"));
    }

    registry
}

/// A signed credential of `credential_type` about `subject`, issued and
/// signed by `issuer` at `at`.
pub fn credential(
    issuer: &KeyPair,
    subject: PublicKey,
    credential_type: &str,
    claim_field: &str,
    claim_value: impl Into<ClaimValue>,
    at: Timestamp,
) -> VerifiableCredential {
    CredentialBuilder::new()
        .credential_type(["VerifiableCredential", credential_type])
        .credential_subject(subject)
        .issuer(issuer.public())
        .claim(claim_field, claim_value)
        .valid_from(at)
        .sign_with(issuer.public(), at)
        .finish()
        .unwrap_or_else(|e| panic!("credential build: {e}"))
        .sign(issuer)
        .unwrap_or_else(|e| panic!("credential sign: {e}"))
}

/// A presentation by `holder` containing `credentials`.
pub fn presentation(
    holder: &KeyPair,
    credentials: Vec<VerifiableCredential>,
) -> VerifiablePresentation {
    PresentationBuilder::new()
        .presentation_type(["VerifiablePresentation"])
        .holder(holder.public())
        .credentials(credentials)
        .sign_with(holder.public())
        .finish()
        .unwrap_or_else(|e| panic!("presentation build: {e}"))
        .sign(holder)
        .unwrap_or_else(|e| panic!("presentation sign: {e}"))
}
