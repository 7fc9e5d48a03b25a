//! Signed identity operations.
//!
//! An operation targets a document, carries a sequence number, a timestamp,
//! the hash of the previous operation and an ordered list of actions.
//!
//! # Invariants
//!
//! - `encode()` is canonical: the same operation always encodes to the
//!   same bytes
//! - `Operation::decode(doc, op.encode()) == op`
//! - `hash()` is the 32-byte sha-256 of the signature-free encoding, so it
//!   is content-addressed and stable across runs
//! - `signed_by(k)` holds iff the operation carries a valid signature from
//!   `k` over `hash()`

use self_core::{KeyPair, PublicKey, Result, SelfError, Signature, Timestamp};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single action within an operation.
///
/// `Threshold` and `Weight` update signing policy rather than keystate;
/// they are applied to the document but do not surface in
/// [`Operation::actions`] summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Grant roles to a key embedded in this document.
    GrantEmbedded {
        /// The key being granted
        key: PublicKey,
        /// Optional controlling identity
        controller: Option<PublicKey>,
        /// Role mask granted
        roles: u64,
    },
    /// Grant roles to a key controlled by another identity.
    GrantReferenced {
        /// DID method of the controlling identity
        method: String,
        /// The controlling identity's address
        controller: PublicKey,
        /// The key being granted
        key: PublicKey,
        /// Role mask granted
        roles: u64,
    },
    /// Replace the role mask of an existing key.
    Modify {
        /// The key being modified
        key: PublicKey,
        /// New role mask
        roles: u64,
    },
    /// Revoke a key from a given time onward.
    Revoke {
        /// The key being revoked
        key: PublicKey,
        /// Unix seconds from which the key is no longer valid
        effective_from: i64,
    },
    /// Revoke every active key from a given time onward.
    Recover {
        /// Unix seconds from which existing keys are no longer valid
        effective_from: i64,
    },
    /// Permanently deactivate the document.
    Deactivate {
        /// Unix seconds from which the document is deactivated
        effective_from: i64,
    },
    /// Set the signing threshold for a role.
    Threshold {
        /// Role the threshold applies to
        role: u64,
        /// Number of weighted signatures required
        threshold: u32,
    },
    /// Set the signing weight of a key for a role.
    Weight {
        /// The key the weight applies to
        key: PublicKey,
        /// Role the weight applies to
        role: u64,
        /// Signature weight
        weight: u32,
    },
}

/// The kind of an action as surfaced by [`ActionSummary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// A key was granted roles
    Grant,
    /// A key was revoked
    Revoke,
    /// A key's roles were replaced
    Modify,
    /// All keys were revoked
    Recover,
    /// The document was deactivated
    Deactivate,
}

/// How the key of a grant is described.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionKind {
    /// The action carries no key description
    None,
    /// The key is embedded in this document
    Embedded,
    /// The key references another identity
    Reference,
}

/// Description of an embedded key grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedDescription {
    /// The granted key
    pub address: PublicKey,
    /// Optional controlling identity
    pub controller: Option<PublicKey>,
}

/// Description of a referenced key grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceDescription {
    /// The granted key
    pub address: PublicKey,
    /// The controlling identity's address
    pub controller: PublicKey,
    /// DID method of the controlling identity
    pub method: String,
}

/// Read-only summary of one keystate-visible action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSummary {
    kind: ActionKind,
    description: DescriptionKind,
    embedded: Option<EmbeddedDescription>,
    reference: Option<ReferenceDescription>,
    from: i64,
    roles: u64,
}

impl ActionSummary {
    /// The action kind.
    pub fn action(&self) -> ActionKind {
        self.kind
    }

    /// How the affected key is described.
    pub fn description(&self) -> DescriptionKind {
        self.description
    }

    /// The embedded key description, when present.
    pub fn embedded(&self) -> Option<&EmbeddedDescription> {
        self.embedded.as_ref()
    }

    /// The referenced key description, when present.
    pub fn reference(&self) -> Option<&ReferenceDescription> {
        self.reference.as_ref()
    }

    /// When the action takes effect.
    pub fn from(&self) -> Timestamp {
        self_core::from_unix(self.from)
    }

    /// The role mask the action carries (zero when not applicable).
    pub fn roles(&self) -> u64 {
        self.roles
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
struct OperationSignature {
    signer: PublicKey,
    signature: Signature,
}

// Signature-free view used for hashing. Field order pins the canonical
// encoding; never reorder.
#[derive(Serialize)]
struct OperationPayload<'a> {
    identifier: &'a PublicKey,
    sequence: u32,
    timestamp: i64,
    previous: &'a Option<Vec<u8>>,
    actions: &'a [Action],
}

/// A signed identity operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    identifier: PublicKey,
    sequence: u32,
    timestamp: i64,
    previous: Option<Vec<u8>>,
    actions: Vec<Action>,
    signatures: Vec<OperationSignature>,
}

impl Operation {
    /// The document this operation targets.
    pub fn identifier(&self) -> &PublicKey {
        &self.identifier
    }

    /// The operation's sequence number.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// When the operation was created.
    pub fn timestamp(&self) -> Timestamp {
        self_core::from_unix(self.timestamp)
    }

    /// The wire-form timestamp (unix seconds).
    pub fn timestamp_unix(&self) -> i64 {
        self.timestamp
    }

    /// The hash of the previous operation, if any.
    pub fn previous(&self) -> Option<&[u8]> {
        self.previous.as_deref()
    }

    /// The raw ordered action list, policy actions included.
    pub fn raw_actions(&self) -> &[Action] {
        &self.actions
    }

    /// Summaries of the keystate-visible actions, in operation order.
    ///
    /// Policy actions (`Threshold`, `Weight`) are applied to documents but
    /// have no summary form.
    pub fn actions(&self) -> Vec<ActionSummary> {
        self.actions
            .iter()
            .filter_map(|action| match action {
                Action::GrantEmbedded {
                    key,
                    controller,
                    roles,
                } => Some(ActionSummary {
                    kind: ActionKind::Grant,
                    description: DescriptionKind::Embedded,
                    embedded: Some(EmbeddedDescription {
                        address: *key,
                        controller: *controller,
                    }),
                    reference: None,
                    from: self.timestamp,
                    roles: *roles,
                }),
                Action::GrantReferenced {
                    method,
                    controller,
                    key,
                    roles,
                } => Some(ActionSummary {
                    kind: ActionKind::Grant,
                    description: DescriptionKind::Reference,
                    embedded: None,
                    reference: Some(ReferenceDescription {
                        address: *key,
                        controller: *controller,
                        method: method.clone(),
                    }),
                    from: self.timestamp,
                    roles: *roles,
                }),
                Action::Modify { key, roles } => Some(ActionSummary {
                    kind: ActionKind::Modify,
                    description: DescriptionKind::Embedded,
                    embedded: Some(EmbeddedDescription {
                        address: *key,
                        controller: None,
                    }),
                    reference: None,
                    from: self.timestamp,
                    roles: *roles,
                }),
                Action::Revoke {
                    key,
                    effective_from,
                } => Some(ActionSummary {
                    kind: ActionKind::Revoke,
                    description: DescriptionKind::Embedded,
                    embedded: Some(EmbeddedDescription {
                        address: *key,
                        controller: None,
                    }),
                    reference: None,
                    from: *effective_from,
                    roles: 0,
                }),
                Action::Recover { effective_from } => Some(ActionSummary {
                    kind: ActionKind::Recover,
                    description: DescriptionKind::None,
                    embedded: None,
                    reference: None,
                    from: *effective_from,
                    roles: 0,
                }),
                Action::Deactivate { effective_from } => Some(ActionSummary {
                    kind: ActionKind::Deactivate,
                    description: DescriptionKind::None,
                    embedded: None,
                    reference: None,
                    from: *effective_from,
                    roles: 0,
                }),
                Action::Threshold { .. } | Action::Weight { .. } => None,
            })
            .collect()
    }

    /// The 32-byte content hash over the signature-free encoding.
    pub fn hash(&self) -> [u8; 32] {
        let payload = OperationPayload {
            identifier: &self.identifier,
            sequence: self.sequence,
            timestamp: self.timestamp,
            previous: &self.previous,
            actions: &self.actions,
        };

        // OperationPayload contains no map types; bincode cannot fail here
        // short of allocation failure, which is unrecoverable anyway.
        let encoded = bincode::serialize(&payload).unwrap_or_default();
        Sha256::digest(&encoded).into()
    }

    /// Whether the operation carries a valid signature from `key`.
    pub fn signed_by(&self, key: &PublicKey) -> bool {
        let hash = self.hash();
        self.signatures
            .iter()
            .any(|entry| entry.signer == *key && key.verify(&hash, &entry.signature))
    }

    /// The addresses that signed this operation, in signing order.
    pub fn signers(&self) -> Vec<PublicKey> {
        self.signatures.iter().map(|entry| entry.signer).collect()
    }

    /// Canonical wire encoding.
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| SelfError::serialization(e.to_string()))
    }

    /// Decode an operation known to target `document_address`.
    pub fn decode(document_address: &PublicKey, bytes: &[u8]) -> Result<Operation> {
        let operation: Operation = bincode::deserialize(bytes)
            .map_err(|e| SelfError::serialization(format!("operation decode: {e}")))?;

        if operation.identifier != *document_address {
            return Err(SelfError::invalid(format!(
                "operation targets {}, expected {}",
                operation.identifier.address(),
                document_address.address()
            )));
        }

        Ok(operation)
    }
}

/// Fluent builder for identity operations.
///
/// Consumed by [`OperationBuilder::finish`]; signing happens at finish so
/// every collected signature covers the final content hash.
#[derive(Debug, Default, Clone)]
pub struct OperationBuilder {
    identifier: Option<PublicKey>,
    sequence: u32,
    timestamp: i64,
    previous: Option<Vec<u8>>,
    actions: Vec<Action>,
    signers: Vec<KeyPair>,
}

impl OperationBuilder {
    /// Start an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Target document address.
    pub fn identifier(mut self, address: PublicKey) -> Self {
        self.identifier = Some(address);
        self
    }

    /// Sequence number of the operation.
    pub fn sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Creation timestamp.
    pub fn timestamp(mut self, at: Timestamp) -> Self {
        self.timestamp = self_core::to_unix(at);
        self
    }

    /// Hash of the previous operation.
    pub fn previous(mut self, hash: [u8; 32]) -> Self {
        self.previous = Some(hash.to_vec());
        self
    }

    /// Grant roles to a key embedded in this document.
    pub fn grant_embedded(mut self, key: PublicKey, roles: u64) -> Self {
        self.actions.push(Action::GrantEmbedded {
            key,
            controller: None,
            roles,
        });
        self
    }

    /// Grant roles to a key controlled by another identity.
    pub fn grant_referenced(
        mut self,
        method: impl Into<String>,
        controller: PublicKey,
        key: PublicKey,
        roles: u64,
    ) -> Self {
        self.actions.push(Action::GrantReferenced {
            method: method.into(),
            controller,
            key,
            roles,
        });
        self
    }

    /// Replace the role mask of an existing key.
    pub fn modify(mut self, key: PublicKey, roles: u64) -> Self {
        self.actions.push(Action::Modify { key, roles });
        self
    }

    /// Revoke a key from `effective_from` onward.
    pub fn revoke(mut self, key: PublicKey, effective_from: Timestamp) -> Self {
        self.actions.push(Action::Revoke {
            key,
            effective_from: self_core::to_unix(effective_from),
        });
        self
    }

    /// Set the signing threshold for a role.
    pub fn threshold(mut self, role: u64, threshold: u32) -> Self {
        self.actions.push(Action::Threshold { role, threshold });
        self
    }

    /// Set the signing weight of a key for a role.
    pub fn weight(mut self, key: PublicKey, role: u64, weight: u32) -> Self {
        self.actions.push(Action::Weight { key, role, weight });
        self
    }

    /// Revoke every active key from `effective_from` onward.
    pub fn recover(mut self, effective_from: Timestamp) -> Self {
        self.actions.push(Action::Recover {
            effective_from: self_core::to_unix(effective_from),
        });
        self
    }

    /// Permanently deactivate the document from `effective_from` onward.
    pub fn deactivate(mut self, effective_from: Timestamp) -> Self {
        self.actions.push(Action::Deactivate {
            effective_from: self_core::to_unix(effective_from),
        });
        self
    }

    /// Sign the finished operation with `signer`.
    pub fn sign_with(mut self, signer: &KeyPair) -> Self {
        self.signers.push(signer.clone());
        self
    }

    /// Consume the builder and produce the signed operation.
    pub fn finish(self) -> Result<Operation> {
        let identifier = self
            .identifier
            .ok_or_else(|| SelfError::incomplete("operation", "identifier"))?;

        if self.actions.is_empty() {
            return Err(SelfError::incomplete("operation", "actions"));
        }

        let mut operation = Operation {
            identifier,
            sequence: self.sequence,
            timestamp: self.timestamp,
            previous: self.previous,
            actions: self.actions,
            signatures: Vec::new(),
        };

        let hash = operation.hash();
        for signer in &self.signers {
            operation.signatures.push(OperationSignature {
                signer: signer.public(),
                signature: signer.sign(&hash),
            });
        }

        Ok(operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::{ROLE_ASSERTION, ROLE_INVOCATION, ROLE_MESSAGING};
    use self_core::from_unix;

    fn sample_operation(signer: &KeyPair) -> Operation {
        let key = KeyPair::generate().public();
        OperationBuilder::new()
            .identifier(signer.public())
            .sequence(0)
            .timestamp(from_unix(1_700_000_000))
            .grant_embedded(signer.public(), ROLE_ASSERTION | ROLE_INVOCATION)
            .grant_embedded(key, ROLE_MESSAGING)
            .threshold(ROLE_INVOCATION, 1)
            .sign_with(signer)
            .finish()
            .unwrap()
    }

    #[test]
    fn encode_decode_round_trip() {
        let signer = KeyPair::generate();
        let operation = sample_operation(&signer);

        let decoded = Operation::decode(&signer.public(), &operation.encode().unwrap()).unwrap();

        assert_eq!(decoded, operation);
        assert_eq!(decoded.hash(), operation.hash());
        assert_eq!(decoded.actions(), operation.actions());
    }

    #[test]
    fn decode_rejects_wrong_document() {
        let signer = KeyPair::generate();
        let operation = sample_operation(&signer);
        let other = KeyPair::generate().public();

        assert!(Operation::decode(&other, &operation.encode().unwrap()).is_err());
    }

    #[test]
    fn hash_is_signature_independent() {
        let signer = KeyPair::generate();
        let other = KeyPair::generate();

        let base = OperationBuilder::new()
            .identifier(signer.public())
            .sequence(3)
            .timestamp(from_unix(1_700_000_000))
            .grant_embedded(other.public(), ROLE_MESSAGING);

        let once = base.clone().sign_with(&signer).finish().unwrap();
        let twice = base.sign_with(&signer).sign_with(&other).finish().unwrap();

        assert_eq!(once.hash(), twice.hash());
    }

    #[test]
    fn signed_by_tracks_actual_signers() {
        let signer = KeyPair::generate();
        let bystander = KeyPair::generate();
        let operation = sample_operation(&signer);

        assert!(operation.signed_by(&signer.public()));
        assert!(!operation.signed_by(&bystander.public()));
        assert_eq!(operation.signers(), vec![signer.public()]);
    }

    #[test]
    fn summaries_skip_policy_actions() {
        let signer = KeyPair::generate();
        let operation = sample_operation(&signer);

        let summaries = operation.actions();
        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().all(|s| s.action() == ActionKind::Grant));
        assert_eq!(summaries[0].description(), DescriptionKind::Embedded);
        assert_eq!(
            summaries[0].embedded().unwrap().address,
            signer.public()
        );
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;
        use self_core::KeyAlgorithm;

        // Builder-level action descriptions, foldable onto a builder.
        #[derive(Debug, Clone)]
        enum AnyAction {
            Grant([u8; 32], u64),
            Modify([u8; 32], u64),
            Revoke([u8; 32], i64),
            Recover(i64),
            Deactivate(i64),
            Threshold(u64, u32),
            Weight([u8; 32], u64, u32),
        }

        fn arb_key() -> impl Strategy<Value = [u8; 32]> {
            proptest::array::uniform32(any::<u8>())
        }

        fn arb_action() -> impl Strategy<Value = AnyAction> {
            let at = 0i64..4_000_000_000;
            prop_oneof![
                (arb_key(), any::<u64>()).prop_map(|(k, roles)| AnyAction::Grant(k, roles)),
                (arb_key(), any::<u64>()).prop_map(|(k, roles)| AnyAction::Modify(k, roles)),
                (arb_key(), at.clone()).prop_map(|(k, at)| AnyAction::Revoke(k, at)),
                at.clone().prop_map(AnyAction::Recover),
                at.prop_map(AnyAction::Deactivate),
                (any::<u64>(), any::<u32>()).prop_map(|(role, n)| AnyAction::Threshold(role, n)),
                (arb_key(), any::<u64>(), any::<u32>())
                    .prop_map(|(k, role, w)| AnyAction::Weight(k, role, w)),
            ]
        }

        fn apply(builder: OperationBuilder, action: &AnyAction) -> OperationBuilder {
            let key = |bytes: &[u8; 32]| PublicKey::new(KeyAlgorithm::Ed25519, *bytes);
            match action {
                AnyAction::Grant(k, roles) => builder.grant_embedded(key(k), *roles),
                AnyAction::Modify(k, roles) => builder.modify(key(k), *roles),
                AnyAction::Revoke(k, at) => builder.revoke(key(k), self_core::from_unix(*at)),
                AnyAction::Recover(at) => builder.recover(self_core::from_unix(*at)),
                AnyAction::Deactivate(at) => builder.deactivate(self_core::from_unix(*at)),
                AnyAction::Threshold(role, n) => builder.threshold(*role, *n),
                AnyAction::Weight(k, role, w) => builder.weight(key(k), *role, *w),
            }
        }

        proptest! {
            #[test]
            fn any_operation_round_trips(
                actions in proptest::collection::vec(arb_action(), 1..8),
                sequence in any::<u32>(),
                timestamp in 0i64..4_000_000_000,
            ) {
                let signer = KeyPair::generate();
                let mut builder = OperationBuilder::new()
                    .identifier(signer.public())
                    .sequence(sequence)
                    .timestamp(self_core::from_unix(timestamp));
                for action in &actions {
                    builder = apply(builder, action);
                }
                let operation = builder.sign_with(&signer).finish().unwrap();

                let decoded =
                    Operation::decode(&signer.public(), &operation.encode().unwrap()).unwrap();

                prop_assert_eq!(decoded.hash(), operation.hash());
                prop_assert_eq!(decoded.actions(), operation.actions());
                prop_assert_eq!(&decoded, &operation);
                prop_assert!(decoded.signed_by(&signer.public()));
            }
        }
    }

    #[test]
    fn finish_requires_identifier_and_actions() {
        let err = OperationBuilder::new().finish().unwrap_err();
        assert!(matches!(err, self_core::SelfError::Incomplete { .. }));

        let err = OperationBuilder::new()
            .identifier(KeyPair::generate().public())
            .finish()
            .unwrap_err();
        assert!(matches!(err, self_core::SelfError::Incomplete { .. }));
    }
}
