//! Verifiable presentations: builder, unsigned form, signed form.

use crate::credential::VerifiableCredential;
use self_core::{KeyPair, PublicKey, Result, SelfError, Signature};
use self_identity::DocumentResolver;
use serde::{Deserialize, Serialize};

// Canonical signing payload. Field order pins the encoding; never reorder.
#[derive(Serialize)]
struct PresentationPayload<'a> {
    presentation_type: &'a [String],
    holder: &'a PublicKey,
    credentials: &'a [VerifiableCredential],
    signer: &'a PublicKey,
}

/// A presentation awaiting signature by the account primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsignedPresentation {
    /// Presentation type list, base type first
    pub presentation_type: Vec<String>,
    /// The holder presenting the credentials
    pub holder: PublicKey,
    /// Ordered list of contained credentials
    pub credentials: Vec<VerifiableCredential>,
    /// Address of the key that will sign
    pub signer: PublicKey,
}

impl UnsignedPresentation {
    /// The canonical bytes a signer commits to.
    pub fn signing_payload(&self) -> Result<Vec<u8>> {
        let payload = PresentationPayload {
            presentation_type: &self.presentation_type,
            holder: &self.holder,
            credentials: &self.credentials,
            signer: &self.signer,
        };
        bincode::serialize(&payload).map_err(|e| SelfError::serialization(e.to_string()))
    }

    /// Sign with a local keypair, producing the verifiable form.
    pub fn sign(&self, keypair: &KeyPair) -> Result<VerifiablePresentation> {
        if keypair.public() != self.signer {
            return Err(SelfError::crypto(
                "signing keypair does not match declared signer",
            ));
        }

        let signature = keypair.sign(&self.signing_payload()?);
        Ok(VerifiablePresentation {
            presentation_type: self.presentation_type.clone(),
            holder: self.holder,
            credentials: self.credentials.clone(),
            signer: self.signer,
            signature,
        })
    }
}

/// A signed verifiable presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiablePresentation {
    presentation_type: Vec<String>,
    holder: PublicKey,
    credentials: Vec<VerifiableCredential>,
    signer: PublicKey,
    signature: Signature,
}

impl VerifiablePresentation {
    /// The presentation type list.
    pub fn presentation_type(&self) -> &[String] {
        &self.presentation_type
    }

    /// The holder's address.
    pub fn holder(&self) -> &PublicKey {
        &self.holder
    }

    /// The contained credentials, in presentation order.
    pub fn credentials(&self) -> &[VerifiableCredential] {
        &self.credentials
    }

    /// The signing key's address.
    pub fn signer(&self) -> &PublicKey {
        &self.signer
    }

    fn unsigned(&self) -> UnsignedPresentation {
        UnsignedPresentation {
            presentation_type: self.presentation_type.clone(),
            holder: self.holder,
            credentials: self.credentials.clone(),
            signer: self.signer,
        }
    }

    /// Validate the presentation-level signature.
    ///
    /// The signature must verify over the canonical payload, and the
    /// signer must be the holder itself or, when the holder's document
    /// resolves, a key currently valid on that document. Contained
    /// credentials are validated separately by the validity graph.
    pub fn validate(&self, resolver: &dyn DocumentResolver) -> Result<()> {
        let payload = self.unsigned().signing_payload()?;
        if !self.signer.verify(&payload, &self.signature) {
            return Err(SelfError::crypto("presentation signature is invalid"));
        }

        if self.signer != self.holder {
            match resolver.resolve(&self.holder) {
                Some(document) if document.valid_at(&self.signer, self_core::now()) => {}
                Some(_) => {
                    return Err(SelfError::crypto(
                        "presentation signer is not a valid key of the holder",
                    ))
                }
                None => {
                    tracing::debug!(
                        holder = %self.holder.address(),
                        "holder document unavailable, accepting presentation signer"
                    );
                }
            }
        }

        Ok(())
    }
}

/// Fluent builder for presentations.
#[derive(Debug, Default, Clone)]
pub struct PresentationBuilder {
    presentation_type: Vec<String>,
    holder: Option<PublicKey>,
    credentials: Vec<VerifiableCredential>,
    signer: Option<PublicKey>,
}

impl PresentationBuilder {
    /// Start an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the presentation type list.
    pub fn presentation_type<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.presentation_type = types.into_iter().map(Into::into).collect();
        self
    }

    /// Set the holder address.
    pub fn holder(mut self, holder: PublicKey) -> Self {
        self.holder = Some(holder);
        self
    }

    /// Append one credential.
    pub fn credential(mut self, credential: VerifiableCredential) -> Self {
        self.credentials.push(credential);
        self
    }

    /// Append several credentials, preserving order.
    pub fn credentials<I>(mut self, credentials: I) -> Self
    where
        I: IntoIterator<Item = VerifiableCredential>,
    {
        self.credentials.extend(credentials);
        self
    }

    /// Declare the signing key.
    pub fn sign_with(mut self, signer: PublicKey) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Validate completeness and produce the unsigned presentation.
    pub fn finish(self) -> Result<UnsignedPresentation> {
        if self.presentation_type.is_empty() {
            return Err(SelfError::incomplete("presentation", "presentation_type"));
        }

        let holder = self
            .holder
            .ok_or_else(|| SelfError::incomplete("presentation", "holder"))?;
        let signer = self
            .signer
            .ok_or_else(|| SelfError::incomplete("presentation", "signer"))?;

        Ok(UnsignedPresentation {
            presentation_type: self.presentation_type,
            holder,
            credentials: self.credentials,
            signer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialBuilder;
    use self_core::from_unix;
    use self_identity::IdentityDocument;

    const T0: i64 = 1_700_000_000;

    struct NoDocuments;

    impl DocumentResolver for NoDocuments {
        fn resolve(&self, _address: &PublicKey) -> Option<IdentityDocument> {
            None
        }
    }

    fn holder_presentation(holder: &KeyPair) -> VerifiablePresentation {
        let issuer = KeyPair::generate();
        let credential = CredentialBuilder::new()
            .credential_type(["VerifiableCredential", "EmailCredential"])
            .credential_subject(holder.public())
            .issuer(issuer.public())
            .claim("emailAddress", "alice@example.com")
            .sign_with(issuer.public(), from_unix(T0))
            .finish()
            .unwrap()
            .sign(&issuer)
            .unwrap();

        PresentationBuilder::new()
            .presentation_type(["VerifiablePresentation"])
            .holder(holder.public())
            .credential(credential)
            .sign_with(holder.public())
            .finish()
            .unwrap()
            .sign(holder)
            .unwrap()
    }

    #[test]
    fn holder_signed_presentation_validates() {
        let holder = KeyPair::generate();
        let presentation = holder_presentation(&holder);

        assert!(presentation.validate(&NoDocuments).is_ok());
        assert_eq!(presentation.holder(), &holder.public());
        assert_eq!(presentation.credentials().len(), 1);
    }

    #[test]
    fn wrong_keypair_cannot_sign() {
        let holder = KeyPair::generate();
        let other = KeyPair::generate();

        let unsigned = PresentationBuilder::new()
            .presentation_type(["VerifiablePresentation"])
            .holder(holder.public())
            .sign_with(holder.public())
            .finish()
            .unwrap();

        assert!(unsigned.sign(&other).is_err());
    }

    #[test]
    fn builder_requires_holder_and_signer() {
        let err = PresentationBuilder::new()
            .presentation_type(["VerifiablePresentation"])
            .finish()
            .unwrap_err();
        assert_eq!(err, SelfError::incomplete("presentation", "holder"));
    }
}
