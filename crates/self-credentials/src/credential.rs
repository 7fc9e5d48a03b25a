//! Verifiable credentials: builder, unsigned form, signed form.

use self_core::{ClaimMap, ClaimValue, KeyPair, PublicKey, Result, SelfError, Signature, Timestamp};
use self_identity::{DocumentResolver, ROLE_ASSERTION};
use serde::{Deserialize, Serialize};

// Canonical signing payload. Field order pins the encoding; never reorder.
#[derive(Serialize)]
struct CredentialPayload<'a> {
    credential_type: &'a [String],
    subject: &'a PublicKey,
    issuer: &'a PublicKey,
    claims: &'a ClaimMap,
    valid_from: i64,
    issued_at: i64,
    signer: &'a PublicKey,
}

/// A credential awaiting signature by the account primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsignedCredential {
    /// Credential type list, base type first
    pub credential_type: Vec<String>,
    /// Address of the subject the claims are about
    pub subject: PublicKey,
    /// Address of the issuing identity
    pub issuer: PublicKey,
    /// Claim map
    pub claims: ClaimMap,
    /// Unix seconds from which the credential is valid
    pub valid_from: i64,
    /// Unix seconds at which the credential was issued
    pub issued_at: i64,
    /// Address of the key that will sign
    pub signer: PublicKey,
}

impl UnsignedCredential {
    /// The canonical bytes a signer commits to.
    pub fn signing_payload(&self) -> Result<Vec<u8>> {
        let payload = CredentialPayload {
            credential_type: &self.credential_type,
            subject: &self.subject,
            issuer: &self.issuer,
            claims: &self.claims,
            valid_from: self.valid_from,
            issued_at: self.issued_at,
            signer: &self.signer,
        };
        bincode::serialize(&payload).map_err(|e| SelfError::serialization(e.to_string()))
    }

    /// Sign with a local keypair, producing the verifiable form.
    ///
    /// The keypair must match the declared signer address. Production
    /// signing goes through the account primitive; this is the path the
    /// primitive itself (and the testkit) uses.
    pub fn sign(&self, keypair: &KeyPair) -> Result<VerifiableCredential> {
        if keypair.public() != self.signer {
            return Err(SelfError::crypto(
                "signing keypair does not match declared signer",
            ));
        }

        let signature = keypair.sign(&self.signing_payload()?);
        Ok(VerifiableCredential {
            credential_type: self.credential_type.clone(),
            subject: self.subject,
            issuer: self.issuer,
            claims: self.claims.clone(),
            valid_from: self.valid_from,
            issued_at: self.issued_at,
            signer: self.signer,
            signature,
        })
    }
}

/// A signed verifiable credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiableCredential {
    credential_type: Vec<String>,
    subject: PublicKey,
    issuer: PublicKey,
    claims: ClaimMap,
    valid_from: i64,
    issued_at: i64,
    signer: PublicKey,
    signature: Signature,
}

impl VerifiableCredential {
    /// The credential type list.
    pub fn credential_type(&self) -> &[String] {
        &self.credential_type
    }

    /// The types beyond the base `VerifiableCredential` tag.
    pub fn specific_types(&self) -> impl Iterator<Item = &str> {
        self.credential_type
            .iter()
            .map(String::as_str)
            .filter(|t| *t != crate::CREDENTIAL_TYPE_BASE)
    }

    /// The subject address.
    pub fn subject(&self) -> &PublicKey {
        &self.subject
    }

    /// The issuer address.
    pub fn issuer(&self) -> &PublicKey {
        &self.issuer
    }

    /// The claim map.
    pub fn claims(&self) -> &ClaimMap {
        &self.claims
    }

    /// A single claim by field name.
    pub fn claim(&self, field: &str) -> Option<&ClaimValue> {
        self.claims.get(field)
    }

    /// When the credential becomes valid.
    pub fn valid_from(&self) -> Timestamp {
        self_core::from_unix(self.valid_from)
    }

    /// When the credential was issued.
    pub fn created_at(&self) -> Timestamp {
        self_core::from_unix(self.issued_at)
    }

    /// The signing key's address.
    pub fn signer(&self) -> &PublicKey {
        &self.signer
    }

    /// The detached signature bytes; also the credential's dedup identity.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    fn unsigned(&self) -> UnsignedCredential {
        UnsignedCredential {
            credential_type: self.credential_type.clone(),
            subject: self.subject,
            issuer: self.issuer,
            claims: self.claims.clone(),
            valid_from: self.valid_from,
            issued_at: self.issued_at,
            signer: self.signer,
        }
    }

    /// Validate the credential's signature chain.
    ///
    /// The signature must verify over the canonical payload. When the
    /// resolver yields the issuer's document, the signer must additionally
    /// hold the `Assertion` role at issue time; an unresolvable issuer
    /// document skips that check, mirroring the policy for unavailable
    /// revocation data.
    pub fn validate(&self, resolver: &dyn DocumentResolver) -> Result<()> {
        let payload = self.unsigned().signing_payload()?;
        if !self.signer.verify(&payload, &self.signature) {
            return Err(SelfError::crypto("credential signature is invalid"));
        }

        match resolver.resolve(&self.issuer) {
            Some(document) => {
                if !document.has_roles_at(&self.signer, ROLE_ASSERTION, self.created_at()) {
                    return Err(SelfError::crypto(
                        "credential signer lacks assertion role at issue time",
                    ));
                }
            }
            None => {
                tracing::debug!(
                    issuer = %self.issuer.address(),
                    "issuer document unavailable, skipping assertion role check"
                );
            }
        }

        Ok(())
    }
}

/// Fluent builder for credentials.
///
/// Accumulates fields, then [`CredentialBuilder::finish`] validates
/// completeness and produces the unsigned form for the account primitive
/// to sign.
#[derive(Debug, Default, Clone)]
pub struct CredentialBuilder {
    credential_type: Vec<String>,
    subject: Option<PublicKey>,
    issuer: Option<PublicKey>,
    claims: ClaimMap,
    valid_from: Option<i64>,
    issued_at: Option<i64>,
    signer: Option<PublicKey>,
}

impl CredentialBuilder {
    /// Start an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the credential type list.
    pub fn credential_type<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.credential_type = types.into_iter().map(Into::into).collect();
        self
    }

    /// Set the subject address.
    pub fn credential_subject(mut self, subject: PublicKey) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Set the issuer address.
    pub fn issuer(mut self, issuer: PublicKey) -> Self {
        self.issuer = Some(issuer);
        self
    }

    /// Set one claim, overwriting any previous value for the field.
    pub fn claim(mut self, field: impl Into<String>, value: impl Into<ClaimValue>) -> Self {
        self.claims.insert(field.into(), value.into());
        self
    }

    /// Merge a claim map, last write wins per field.
    pub fn claims(mut self, claims: ClaimMap) -> Self {
        self.claims.extend(claims);
        self
    }

    /// Set the validity start.
    pub fn valid_from(mut self, at: Timestamp) -> Self {
        self.valid_from = Some(self_core::to_unix(at));
        self
    }

    /// Declare the signing key and issue time.
    pub fn sign_with(mut self, signer: PublicKey, issued_at: Timestamp) -> Self {
        self.signer = Some(signer);
        self.issued_at = Some(self_core::to_unix(issued_at));
        self
    }

    /// Validate completeness and produce the unsigned credential.
    pub fn finish(self) -> Result<UnsignedCredential> {
        if self.credential_type.is_empty() {
            return Err(SelfError::incomplete("credential", "credential_type"));
        }

        let subject = self
            .subject
            .ok_or_else(|| SelfError::incomplete("credential", "subject"))?;
        let issuer = self
            .issuer
            .ok_or_else(|| SelfError::incomplete("credential", "issuer"))?;
        let signer = self
            .signer
            .ok_or_else(|| SelfError::incomplete("credential", "signer"))?;
        let issued_at = self
            .issued_at
            .ok_or_else(|| SelfError::incomplete("credential", "issued_at"))?;

        Ok(UnsignedCredential {
            credential_type: self.credential_type,
            subject,
            issuer,
            claims: self.claims,
            valid_from: self.valid_from.unwrap_or(issued_at),
            issued_at,
            signer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use self_core::from_unix;
    use self_identity::{IdentityDocument, ROLE_INVOCATION};

    const T0: i64 = 1_700_000_000;

    struct NoDocuments;

    impl DocumentResolver for NoDocuments {
        fn resolve(&self, _address: &PublicKey) -> Option<IdentityDocument> {
            None
        }
    }

    struct OneDocument(IdentityDocument);

    impl DocumentResolver for OneDocument {
        fn resolve(&self, address: &PublicKey) -> Option<IdentityDocument> {
            (self.0.address() == address).then(|| self.0.clone())
        }
    }

    fn issue(issuer: &KeyPair, subject: PublicKey) -> VerifiableCredential {
        CredentialBuilder::new()
            .credential_type(["VerifiableCredential", "EmailCredential"])
            .credential_subject(subject)
            .issuer(issuer.public())
            .claim("emailAddress", "alice@example.com")
            .valid_from(from_unix(T0))
            .sign_with(issuer.public(), from_unix(T0))
            .finish()
            .unwrap()
            .sign(issuer)
            .unwrap()
    }

    #[test]
    fn builder_requires_all_fields() {
        let err = CredentialBuilder::new().finish().unwrap_err();
        assert_eq!(
            err,
            SelfError::incomplete("credential", "credential_type")
        );

        let err = CredentialBuilder::new()
            .credential_type(["VerifiableCredential"])
            .finish()
            .unwrap_err();
        assert_eq!(err, SelfError::incomplete("credential", "subject"));
    }

    #[test]
    fn claim_overwrites_and_claims_merge() {
        let mut extra = ClaimMap::new();
        extra.insert("emailAddress".into(), "second@example.com".into());
        extra.insert("verified".into(), true.into());

        let issuer = KeyPair::generate();
        let unsigned = CredentialBuilder::new()
            .credential_type(["VerifiableCredential"])
            .credential_subject(issuer.public())
            .issuer(issuer.public())
            .claim("emailAddress", "first@example.com")
            .claims(extra)
            .sign_with(issuer.public(), from_unix(T0))
            .finish()
            .unwrap();

        assert_eq!(
            unsigned.claims.get("emailAddress").unwrap().as_text(),
            Some("second@example.com")
        );
        assert_eq!(
            unsigned.claims.get("verified").unwrap().as_bool(),
            Some(true)
        );
    }

    #[test]
    fn signature_validates_without_issuer_document() {
        let issuer = KeyPair::generate();
        let subject = KeyPair::generate().public();
        let credential = issue(&issuer, subject);

        assert!(credential.validate(&NoDocuments).is_ok());
    }

    #[test]
    fn tampered_signature_rejected() {
        let issuer = KeyPair::generate();
        let imposter = KeyPair::generate();
        let subject = KeyPair::generate().public();

        let unsigned = CredentialBuilder::new()
            .credential_type(["VerifiableCredential"])
            .credential_subject(subject)
            .issuer(issuer.public())
            .sign_with(imposter.public(), from_unix(T0))
            .finish()
            .unwrap();

        // signed by the declared (wrong) key still verifies as a signature,
        // but signing with a mismatched keypair is refused outright
        assert!(unsigned.sign(&issuer).is_err());

        let credential = unsigned.sign(&imposter).unwrap();
        assert!(credential.validate(&NoDocuments).is_ok());
    }

    #[test]
    fn assertion_role_enforced_when_document_available() {
        let issuer = KeyPair::generate();
        let subject = KeyPair::generate().public();
        let credential = issue(&issuer, subject);

        // document grants only invocation, not assertion
        let mut doc = IdentityDocument::new(issuer.public());
        let op = doc
            .create()
            .timestamp(from_unix(T0 - 100))
            .grant_embedded(issuer.public(), ROLE_INVOCATION)
            .sign_with(&issuer)
            .finish()
            .unwrap();
        doc.apply(&op).unwrap();

        assert!(credential.validate(&OneDocument(doc.clone())).is_err());

        // granting assertion fixes validation
        let grant = doc
            .create()
            .timestamp(from_unix(T0 - 50))
            .modify(issuer.public(), ROLE_INVOCATION | ROLE_ASSERTION)
            .sign_with(&issuer)
            .finish()
            .unwrap();
        doc.apply(&grant).unwrap();

        assert!(credential.validate(&OneDocument(doc)).is_ok());
    }

    #[test]
    fn specific_types_exclude_base() {
        let issuer = KeyPair::generate();
        let credential = issue(&issuer, issuer.public());

        let specific: Vec<_> = credential.specific_types().collect();
        assert_eq!(specific, vec!["EmailCredential"]);
    }
}
