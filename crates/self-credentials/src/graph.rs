//! Credential validity graph.
//!
//! Given a set of presentations and a target holder, resolve the set of
//! credentials that hold for that holder right now, applying trust
//! registry policy.

use crate::credential::VerifiableCredential;
use crate::presentation::VerifiablePresentation;
use crate::registry::TrustedIssuerRegistry;
use self_core::PublicKey;
use std::collections::HashSet;

/// The credentials valid for `holder` at the current time.
///
/// A credential is yielded iff:
///
/// 1. it is contained in a presentation whose holder matches `holder`;
/// 2. that presentation passes signature validation;
/// 3. the credential itself passes signature validation (including the
///    issuer `Assertion` role check when the registry resolves the
///    issuer's document);
/// 4. the registry authorizes the issuer for each of the credential's
///    specific types at the credential's creation time;
/// 5. the credential has not been revoked (reserved: passes while
///    revocation data is unavailable);
/// 6. registry prerequisites for its types are satisfied by a companion
///    credential elsewhere in the resolved set.
///
/// Output order is presentation order, then intra-presentation order.
/// Duplicates (same signature bytes) keep the first occurrence.
pub fn credential_graph_valid_for(
    holder: &PublicKey,
    registry: &TrustedIssuerRegistry,
    presentations: &[VerifiablePresentation],
) -> Vec<VerifiableCredential> {
    let now = self_core::now();
    let mut seen: HashSet<Vec<u8>> = HashSet::new();
    let mut candidates: Vec<VerifiableCredential> = Vec::new();

    for presentation in presentations {
        if !presentation.holder().matches(holder) {
            tracing::debug!(
                holder = %presentation.holder().address(),
                "presentation holder mismatch, skipping"
            );
            continue;
        }

        if let Err(reason) = presentation.validate(registry) {
            tracing::debug!(%reason, "presentation failed validation, skipping");
            continue;
        }

        for credential in presentation.credentials() {
            if !seen.insert(credential.signature().as_bytes().to_vec()) {
                continue;
            }

            if credential.validate(registry).is_err() {
                continue;
            }

            let mut specific = credential.specific_types().peekable();
            if specific.peek().is_none() {
                // a bare base-typed credential names nothing an authority
                // could cover
                continue;
            }

            if !specific.all(|t| registry.authorized(credential.issuer(), t, credential.created_at()))
            {
                continue;
            }

            // revocation is reserved; unavailable data passes

            candidates.push(credential.clone());
        }
    }

    // Prerequisites resolve against the candidate set itself, so a
    // companion that appears later in the input still satisfies an
    // earlier credential.
    let satisfied: Vec<bool> = candidates
        .iter()
        .map(|credential| {
            credential.specific_types().all(|t| {
                registry.prerequisite(t).map_or(true, |companion| {
                    candidates
                        .iter()
                        .any(|other| other.specific_types().any(|ot| ot == companion))
                })
            })
        })
        .collect();

    candidates
        .into_iter()
        .zip(satisfied)
        .filter_map(|(credential, ok)| ok.then_some(credential))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialBuilder;
    use crate::presentation::PresentationBuilder;
    use self_core::{from_unix, KeyPair};
    use self_identity::{IdentityDocument, ROLE_ASSERTION, ROLE_INVOCATION};

    const T0: i64 = 1_700_000_000;

    struct Fixture {
        issuer: KeyPair,
        holder: KeyPair,
        registry: TrustedIssuerRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            let issuer = KeyPair::generate();
            let holder = KeyPair::generate();

            let mut registry = TrustedIssuerRegistry::new();
            registry.add_issuer(issuer.public());
            for credential_type in ["EmailCredential", "LivenessCredential", "IdentityCredential"] {
                registry
                    .grant_authority(&issuer.public(), credential_type, from_unix(0), None)
                    .unwrap();
            }

            Self {
                issuer,
                holder,
                registry,
            }
        }

        fn credential(&self, specific_type: &str) -> VerifiableCredential {
            CredentialBuilder::new()
                .credential_type(["VerifiableCredential", specific_type])
                .credential_subject(self.holder.public())
                .issuer(self.issuer.public())
                .claim("field", specific_type)
                .sign_with(self.issuer.public(), from_unix(T0))
                .finish()
                .unwrap()
                .sign(&self.issuer)
                .unwrap()
        }

        fn present(&self, credentials: Vec<VerifiableCredential>) -> VerifiablePresentation {
            PresentationBuilder::new()
                .presentation_type(["VerifiablePresentation"])
                .holder(self.holder.public())
                .credentials(credentials)
                .sign_with(self.holder.public())
                .finish()
                .unwrap()
                .sign(&self.holder)
                .unwrap()
        }
    }

    #[test]
    fn valid_credentials_resolve_in_order() {
        let fx = Fixture::new();
        let email = fx.credential("EmailCredential");
        let liveness = fx.credential("LivenessCredential");

        let valid = credential_graph_valid_for(
            &fx.holder.public(),
            &fx.registry,
            &[fx.present(vec![email.clone()]), fx.present(vec![liveness.clone()])],
        );

        assert_eq!(valid, vec![email, liveness]);
    }

    #[test]
    fn holder_mismatch_excludes_presentation() {
        let fx = Fixture::new();
        let email = fx.credential("EmailCredential");
        let stranger = KeyPair::generate().public();

        let valid =
            credential_graph_valid_for(&stranger, &fx.registry, &[fx.present(vec![email])]);

        assert!(valid.is_empty());
    }

    #[test]
    fn unauthorized_issuer_excluded() {
        let fx = Fixture::new();
        let rogue = KeyPair::generate();
        let credential = CredentialBuilder::new()
            .credential_type(["VerifiableCredential", "EmailCredential"])
            .credential_subject(fx.holder.public())
            .issuer(rogue.public())
            .sign_with(rogue.public(), from_unix(T0))
            .finish()
            .unwrap()
            .sign(&rogue)
            .unwrap();

        let valid = credential_graph_valid_for(
            &fx.holder.public(),
            &fx.registry,
            &[fx.present(vec![credential])],
        );

        assert!(valid.is_empty());
    }

    #[test]
    fn authority_checked_at_creation_time() {
        let fx = Fixture::new();
        let mut registry = TrustedIssuerRegistry::new();
        registry.add_issuer(fx.issuer.public());
        // authority window ends before the credential was created
        registry
            .grant_authority(
                &fx.issuer.public(),
                "EmailCredential",
                from_unix(0),
                Some(from_unix(T0 - 1)),
            )
            .unwrap();

        let email = fx.credential("EmailCredential");
        let valid = credential_graph_valid_for(
            &fx.holder.public(),
            &registry,
            &[fx.present(vec![email])],
        );

        assert!(valid.is_empty());
    }

    #[test]
    fn assertion_role_checked_when_document_registered() {
        let fx = Fixture::new();
        let mut registry = fx.registry.clone();

        // issuer document grants invocation only; assertion is missing
        let mut doc = IdentityDocument::new(fx.issuer.public());
        let op = doc
            .create()
            .timestamp(from_unix(0))
            .grant_embedded(fx.issuer.public(), ROLE_INVOCATION)
            .sign_with(&fx.issuer)
            .finish()
            .unwrap();
        doc.apply(&op).unwrap();
        registry.add_issuer_document(doc.clone());

        let email = fx.credential("EmailCredential");
        let valid = credential_graph_valid_for(
            &fx.holder.public(),
            &registry,
            &[fx.present(vec![email.clone()])],
        );
        assert!(valid.is_empty());

        // with assertion granted the credential resolves
        let grant = doc
            .create()
            .timestamp(from_unix(1))
            .modify(fx.issuer.public(), ROLE_INVOCATION | ROLE_ASSERTION)
            .sign_with(&fx.issuer)
            .finish()
            .unwrap();
        doc.apply(&grant).unwrap();
        registry.add_issuer_document(doc);

        let valid = credential_graph_valid_for(
            &fx.holder.public(),
            &registry,
            &[fx.present(vec![email.clone()])],
        );
        assert_eq!(valid, vec![email]);
    }

    #[test]
    fn duplicates_keep_first() {
        let fx = Fixture::new();
        let email = fx.credential("EmailCredential");

        let valid = credential_graph_valid_for(
            &fx.holder.public(),
            &fx.registry,
            &[
                fx.present(vec![email.clone(), email.clone()]),
                fx.present(vec![email.clone()]),
            ],
        );

        assert_eq!(valid, vec![email]);
    }

    #[test]
    fn prerequisite_requires_companion() {
        let fx = Fixture::new();
        let mut registry = fx.registry.clone();
        registry.require_prerequisite("IdentityCredential", "LivenessCredential");

        let identity = fx.credential("IdentityCredential");

        // alone, the identity credential is excluded
        let valid = credential_graph_valid_for(
            &fx.holder.public(),
            &registry,
            &[fx.present(vec![identity.clone()])],
        );
        assert!(valid.is_empty());

        // with a liveness companion both resolve
        let liveness = fx.credential("LivenessCredential");
        let valid = credential_graph_valid_for(
            &fx.holder.public(),
            &registry,
            &[fx.present(vec![identity.clone(), liveness.clone()])],
        );
        assert_eq!(valid, vec![identity, liveness]);
    }

    #[test]
    fn tampered_presentation_excluded() {
        let fx = Fixture::new();
        let email = fx.credential("EmailCredential");

        // presentation signed by someone other than the holder
        let outsider = KeyPair::generate();
        let forged = PresentationBuilder::new()
            .presentation_type(["VerifiablePresentation"])
            .holder(fx.holder.public())
            .credential(email)
            .sign_with(outsider.public())
            .finish()
            .unwrap()
            .sign(&outsider)
            .unwrap();

        // the holder's document is known, so a foreign signer is rejected
        let mut registry = fx.registry.clone();
        let mut holder_doc = IdentityDocument::new(fx.holder.public());
        let op = holder_doc
            .create()
            .timestamp(from_unix(0))
            .grant_embedded(fx.holder.public(), ROLE_ASSERTION | ROLE_INVOCATION)
            .sign_with(&fx.holder)
            .finish()
            .unwrap();
        holder_doc.apply(&op).unwrap();
        registry.add_issuer_document(holder_doc);

        let valid =
            credential_graph_valid_for(&fx.holder.public(), &registry, &[forged]);
        assert!(valid.is_empty());
    }
}
