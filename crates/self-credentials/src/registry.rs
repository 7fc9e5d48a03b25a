//! Trusted issuer registry.
//!
//! Local policy describing which issuers may issue which credential types,
//! over which time windows. The registry doubles as the document resolver
//! the validity graph uses for issuer keystate, and carries the
//! type-prerequisite table (e.g. a liveness companion requirement).

use self_core::{PublicKey, Result, SelfError, Timestamp};
use self_identity::{DocumentResolver, IdentityDocument};
use std::collections::HashMap;

/// Address of the well-known sandbox issuer.
pub const SANDBOX_ISSUER_ADDRESS: &str =
    "013beea28f0678b2a3ee7fb73343b466b37227ccb673bd4b92b26e7489a8546f1c";

/// Credential types the sandbox issuer is trusted for.
pub const SANDBOX_CREDENTIAL_TYPES: &[&str] = &[
    "LivenessCredential",
    "EmailCredential",
    "PhoneCredential",
    "DocumentCredential",
    "IdentityCredential",
    "ProfileImageCredential",
    "ApplicationCredential",
];

/// One issuing authority: a credential type over a validity window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authority {
    /// The credential type the issuer may issue
    pub credential_type: String,
    /// Unix seconds from which the authority holds
    pub valid_from: i64,
    /// Unix seconds from which the authority no longer holds
    pub valid_until: Option<i64>,
}

impl Authority {
    fn covers(&self, credential_type: &str, at: i64) -> bool {
        self.credential_type == credential_type
            && self.valid_from <= at
            && self.valid_until.map_or(true, |until| at < until)
    }
}

#[derive(Debug, Clone, Default)]
struct IssuerEntry {
    authorities: Vec<Authority>,
    document: Option<IdentityDocument>,
}

/// Registry of trusted issuers and their authorities over time.
#[derive(Debug, Clone, Default)]
pub struct TrustedIssuerRegistry {
    issuers: HashMap<PublicKey, IssuerEntry>,
    prerequisites: HashMap<String, String>,
}

impl TrustedIssuerRegistry {
    /// An empty registry trusting nobody.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an issuer with no authorities yet.
    pub fn add_issuer(&mut self, issuer: PublicKey) {
        self.issuers.entry(issuer).or_default();
    }

    /// Whether `issuer` is registered.
    pub fn has_issuer(&self, issuer: &PublicKey) -> bool {
        self.issuers.contains_key(issuer)
    }

    /// Attach an issuer's identity document for keystate checks.
    ///
    /// Registers the issuer if it was unknown.
    pub fn add_issuer_document(&mut self, document: IdentityDocument) {
        let address = *document.address();
        self.issuers.entry(address).or_default().document = Some(document);
    }

    /// Grant `issuer` the authority to issue `credential_type` from
    /// `from` until `until` (open-ended when `None`).
    pub fn grant_authority(
        &mut self,
        issuer: &PublicKey,
        credential_type: impl Into<String>,
        from: Timestamp,
        until: Option<Timestamp>,
    ) -> Result<()> {
        let entry = self.issuers.get_mut(issuer).ok_or_else(|| {
            SelfError::invalid(format!("issuer {} is not registered", issuer.address()))
        })?;

        entry.authorities.push(Authority {
            credential_type: credential_type.into(),
            valid_from: self_core::to_unix(from),
            valid_until: until.map(self_core::to_unix),
        });

        Ok(())
    }

    /// Whether `issuer` may issue `credential_type` at `at`.
    pub fn authorized(&self, issuer: &PublicKey, credential_type: &str, at: Timestamp) -> bool {
        let at = self_core::to_unix(at);
        self.issuers.get(issuer).is_some_and(|entry| {
            entry
                .authorities
                .iter()
                .any(|authority| authority.covers(credential_type, at))
        })
    }

    /// Require that credentials of `credential_type` are accompanied by a
    /// valid credential of `companion_type` from the same validity graph.
    pub fn require_prerequisite(
        &mut self,
        credential_type: impl Into<String>,
        companion_type: impl Into<String>,
    ) {
        self.prerequisites
            .insert(credential_type.into(), companion_type.into());
    }

    /// The companion type required for `credential_type`, if any.
    pub fn prerequisite(&self, credential_type: &str) -> Option<&str> {
        self.prerequisites.get(credential_type).map(String::as_str)
    }
}

impl DocumentResolver for TrustedIssuerRegistry {
    fn resolve(&self, address: &PublicKey) -> Option<IdentityDocument> {
        self.issuers
            .get(address)
            .and_then(|entry| entry.document.clone())
    }
}

/// The well-known sandbox registry.
///
/// Trusts the sandbox issuer for the standard sandbox credential types
/// from the epoch onward, and requires a liveness companion for identity
/// credentials.
pub fn sandbox_trusted_issuer_registry() -> TrustedIssuerRegistry {
    let mut registry = TrustedIssuerRegistry::new();

    // The constant is well-formed by construction.
    if let Some(issuer) = PublicKey::from_address(SANDBOX_ISSUER_ADDRESS) {
        registry.add_issuer(issuer);
        for credential_type in SANDBOX_CREDENTIAL_TYPES {
            let _ = registry.grant_authority(
                &issuer,
                *credential_type,
                self_core::from_unix(0),
                None,
            );
        }
    }

    registry.require_prerequisite("IdentityCredential", "LivenessCredential");
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use self_core::{from_unix, KeyPair};

    const T0: i64 = 1_700_000_000;

    #[test]
    fn authority_windows_are_half_open() {
        let issuer = KeyPair::generate().public();
        let mut registry = TrustedIssuerRegistry::new();
        registry.add_issuer(issuer);
        registry
            .grant_authority(
                &issuer,
                "EmailCredential",
                from_unix(T0),
                Some(from_unix(T0 + 100)),
            )
            .unwrap();

        assert!(registry.authorized(&issuer, "EmailCredential", from_unix(T0)));
        assert!(registry.authorized(&issuer, "EmailCredential", from_unix(T0 + 99)));
        assert!(!registry.authorized(&issuer, "EmailCredential", from_unix(T0 + 100)));
        assert!(!registry.authorized(&issuer, "EmailCredential", from_unix(T0 - 1)));
        assert!(!registry.authorized(&issuer, "PhoneCredential", from_unix(T0)));
    }

    #[test]
    fn unknown_issuer_cannot_be_granted() {
        let issuer = KeyPair::generate().public();
        let mut registry = TrustedIssuerRegistry::new();

        let err = registry
            .grant_authority(&issuer, "EmailCredential", from_unix(T0), None)
            .unwrap_err();
        assert!(matches!(err, SelfError::Invalid { .. }));
        assert!(!registry.authorized(&issuer, "EmailCredential", from_unix(T0)));
    }

    #[test]
    fn sandbox_registry_is_precanned() {
        let registry = sandbox_trusted_issuer_registry();
        let issuer = PublicKey::from_address(SANDBOX_ISSUER_ADDRESS).unwrap();

        assert!(registry.authorized(&issuer, "LivenessCredential", self_core::now()));
        assert!(registry.authorized(&issuer, "EmailCredential", self_core::now()));
        assert!(!registry.authorized(&issuer, "MadeUpCredential", self_core::now()));
        assert_eq!(
            registry.prerequisite("IdentityCredential"),
            Some("LivenessCredential")
        );
    }
}
