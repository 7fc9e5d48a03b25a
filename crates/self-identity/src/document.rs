//! Identity documents: time-indexed keystate.
//!
//! A document folds a sequence of applied operations into a set of
//! `(key, roles, valid_from, valid_until)` entries plus policy state
//! (thresholds, weights).
//!
//! # Invariants
//!
//! - any `(key, role, at)` query has a deterministic answer
//! - revoked keys never become valid again at times at or after their
//!   revocation effective time
//! - deactivation is terminal: no operation applies afterwards and no key
//!   is valid at or after the deactivation time

use crate::operation::{Action, Operation, OperationBuilder};
use crate::roles::ROLE_INVOCATION;
use self_core::{PublicKey, Result, SelfError, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One key entry in a document's keystate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyState {
    /// The key this entry describes
    pub key: PublicKey,
    /// Role mask currently held
    pub roles: u64,
    /// Unix seconds from which the entry is valid
    pub valid_from: i64,
    /// Unix seconds from which the entry is no longer valid
    pub valid_until: Option<i64>,
    /// Controlling identity for referenced keys
    pub controller: Option<PublicKey>,
    /// DID method for referenced keys
    pub method: Option<String>,
}

impl KeyState {
    fn active_at(&self, at: i64) -> bool {
        self.valid_from <= at && self.valid_until.map_or(true, |until| at < until)
    }

    // Open-ended entries only; already-revoked entries keep their window.
    fn open(&self) -> bool {
        self.valid_until.is_none()
    }
}

/// An identity document: keystate folded from applied operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityDocument {
    address: PublicKey,
    keys: Vec<KeyState>,
    thresholds: BTreeMap<u64, u32>,
    weights: BTreeMap<(PublicKey, u64), u32>,
    deactivated_from: Option<i64>,
    sequence: u32,
    previous_hash: Option<[u8; 32]>,
}

impl IdentityDocument {
    /// A fresh document with no applied operations.
    pub fn new(address: PublicKey) -> Self {
        Self {
            address,
            keys: Vec::new(),
            thresholds: BTreeMap::new(),
            weights: BTreeMap::new(),
            deactivated_from: None,
            sequence: 0,
            previous_hash: None,
        }
    }

    /// The document's address.
    pub fn address(&self) -> &PublicKey {
        &self.address
    }

    /// Number of operations applied so far.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// The current keystate entries.
    pub fn keys(&self) -> &[KeyState] {
        &self.keys
    }

    /// Whether the document is deactivated at `at`.
    pub fn deactivated_at(&self, at: Timestamp) -> bool {
        let at = self_core::to_unix(at);
        self.deactivated_from.map_or(false, |from| at >= from)
    }

    /// The signing threshold configured for `role`, defaulting to one.
    pub fn threshold(&self, role: u64) -> u32 {
        self.thresholds.get(&role).copied().unwrap_or(1)
    }

    /// The signing weight of `key` for `role`, defaulting to one.
    pub fn weight(&self, key: &PublicKey, role: u64) -> u32 {
        self.weights.get(&(*key, role)).copied().unwrap_or(1)
    }

    /// Whether `key` holds every role in `roles` at `at`.
    pub fn has_roles_at(&self, key: &PublicKey, roles: u64, at: Timestamp) -> bool {
        let at = self_core::to_unix(at);
        if self.deactivated_from.map_or(false, |from| at >= from) {
            return false;
        }

        self.keys
            .iter()
            .any(|entry| entry.key == *key && entry.active_at(at) && entry.roles & roles == roles)
    }

    /// Whether `key` is valid at `at`, for any role.
    pub fn valid_at(&self, key: &PublicKey, at: Timestamp) -> bool {
        self.has_roles_at(key, 0, at)
    }

    /// Start an operation pre-targeted at this document.
    ///
    /// Identifier, sequence and previous-hash are filled from the current
    /// document state; the caller supplies timestamp, actions and signers.
    pub fn create(&self) -> OperationBuilder {
        let mut builder = OperationBuilder::new()
            .identifier(self.address)
            .sequence(self.sequence);

        if let Some(hash) = self.previous_hash {
            builder = builder.previous(hash);
        }

        builder
    }

    /// Apply an operation, folding its actions into the keystate.
    ///
    /// The operation must target this document, carry the expected
    /// sequence number and previous hash, and be signed. Operations after
    /// the first must be signed by a key holding `Invocation` at the
    /// operation timestamp.
    pub fn apply(&mut self, operation: &Operation) -> Result<()> {
        if self.deactivated_from.is_some() {
            return Err(SelfError::invalid("document is deactivated"));
        }

        if operation.identifier() != &self.address {
            return Err(SelfError::invalid(format!(
                "operation targets {}, expected {}",
                operation.identifier().address(),
                self.address.address()
            )));
        }

        if operation.sequence() != self.sequence {
            return Err(SelfError::invalid(format!(
                "operation sequence {} does not follow document sequence {}",
                operation.sequence(),
                self.sequence
            )));
        }

        let expected_previous = self.previous_hash.as_ref().map(|h| h.as_slice());
        if operation.previous() != expected_previous {
            return Err(SelfError::invalid("operation previous hash mismatch"));
        }

        let mut signers = operation.signers();
        signers.sort_unstable();
        signers.dedup();
        if signers.is_empty() || !signers.iter().all(|s| operation.signed_by(s)) {
            return Err(SelfError::crypto("operation is not validly signed"));
        }

        // The genesis operation is self-certifying; later operations must
        // carry enough invocation-capable signing weight to meet the
        // configured threshold.
        if self.sequence > 0 {
            let at = operation.timestamp();
            let weight: u32 = signers
                .iter()
                .filter(|s| self.has_roles_at(s, ROLE_INVOCATION, at))
                .map(|s| self.weight(s, ROLE_INVOCATION))
                .sum();

            if weight < self.threshold(ROLE_INVOCATION) {
                return Err(SelfError::crypto(format!(
                    "operation signing weight {weight} below invocation threshold {}",
                    self.threshold(ROLE_INVOCATION)
                )));
            }
        }

        let timestamp = operation.timestamp_unix();
        for action in operation.raw_actions() {
            self.apply_action(action, timestamp);
        }

        self.sequence += 1;
        self.previous_hash = Some(operation.hash());

        Ok(())
    }

    fn apply_action(&mut self, action: &Action, timestamp: i64) {
        match action {
            Action::GrantEmbedded {
                key,
                controller,
                roles,
            } => self.keys.push(KeyState {
                key: *key,
                roles: *roles,
                valid_from: timestamp,
                valid_until: None,
                controller: *controller,
                method: None,
            }),
            Action::GrantReferenced {
                method,
                controller,
                key,
                roles,
            } => self.keys.push(KeyState {
                key: *key,
                roles: *roles,
                valid_from: timestamp,
                valid_until: None,
                controller: Some(*controller),
                method: Some(method.clone()),
            }),
            Action::Modify { key, roles } => {
                for entry in self.keys.iter_mut() {
                    if entry.key == *key && entry.open() {
                        entry.roles = *roles;
                    }
                }
            }
            Action::Revoke {
                key,
                effective_from,
            } => {
                for entry in self.keys.iter_mut() {
                    if entry.key == *key && entry.open() {
                        entry.valid_until = Some(*effective_from);
                    }
                }
            }
            Action::Recover { effective_from } => {
                for entry in self.keys.iter_mut() {
                    if entry.open() {
                        entry.valid_until = Some(*effective_from);
                    }
                }
            }
            Action::Deactivate { effective_from } => {
                self.deactivated_from = Some(*effective_from);
            }
            Action::Threshold { role, threshold } => {
                self.thresholds.insert(*role, *threshold);
            }
            Action::Weight { key, role, weight } => {
                self.weights.insert((*key, *role), *weight);
            }
        }
    }
}

/// Resolution seam for issuer documents.
///
/// Credential validation needs the issuer's keystate; where that document
/// comes from (trust registry, local store, network) is the resolver's
/// concern.
pub trait DocumentResolver: Send + Sync {
    /// The document for `address`, if known.
    fn resolve(&self, address: &PublicKey) -> Option<IdentityDocument>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::{ROLE_ASSERTION, ROLE_INVOCATION, ROLE_MESSAGING};
    use self_core::{from_unix, KeyPair};

    const T0: i64 = 1_700_000_000;

    fn genesis(owner: &KeyPair) -> IdentityDocument {
        let mut doc = IdentityDocument::new(owner.public());
        let op = doc
            .create()
            .timestamp(from_unix(T0))
            .grant_embedded(owner.public(), ROLE_ASSERTION | ROLE_INVOCATION)
            .sign_with(owner)
            .finish()
            .unwrap();
        doc.apply(&op).unwrap();
        doc
    }

    #[test]
    fn grant_establishes_roles_from_timestamp() {
        let owner = KeyPair::generate();
        let doc = genesis(&owner);

        assert!(doc.has_roles_at(&owner.public(), ROLE_ASSERTION, from_unix(T0)));
        assert!(doc.has_roles_at(&owner.public(), ROLE_ASSERTION, from_unix(T0 + 100)));
        assert!(!doc.has_roles_at(&owner.public(), ROLE_ASSERTION, from_unix(T0 - 1)));
        assert!(!doc.has_roles_at(&owner.public(), ROLE_MESSAGING, from_unix(T0)));
    }

    #[test]
    fn revoked_key_never_valid_again() {
        let owner = KeyPair::generate();
        let device = KeyPair::generate();
        let mut doc = genesis(&owner);

        let grant = doc
            .create()
            .timestamp(from_unix(T0 + 10))
            .grant_embedded(device.public(), ROLE_MESSAGING)
            .sign_with(&owner)
            .finish()
            .unwrap();
        doc.apply(&grant).unwrap();

        let revoke = doc
            .create()
            .timestamp(from_unix(T0 + 50))
            .revoke(device.public(), from_unix(T0 + 50))
            .sign_with(&owner)
            .finish()
            .unwrap();
        doc.apply(&revoke).unwrap();

        assert!(doc.valid_at(&device.public(), from_unix(T0 + 20)));
        assert!(!doc.valid_at(&device.public(), from_unix(T0 + 50)));
        assert!(!doc.valid_at(&device.public(), from_unix(T0 + 1_000)));
    }

    #[test]
    fn recover_revokes_everything() {
        let owner = KeyPair::generate();
        let replacement = KeyPair::generate();
        let mut doc = genesis(&owner);

        let recover = doc
            .create()
            .timestamp(from_unix(T0 + 100))
            .recover(from_unix(T0 + 100))
            .grant_embedded(replacement.public(), ROLE_ASSERTION | ROLE_INVOCATION)
            .sign_with(&owner)
            .finish()
            .unwrap();
        doc.apply(&recover).unwrap();

        assert!(!doc.valid_at(&owner.public(), from_unix(T0 + 100)));
        assert!(doc.valid_at(&replacement.public(), from_unix(T0 + 100)));
    }

    #[test]
    fn deactivation_is_terminal() {
        let owner = KeyPair::generate();
        let mut doc = genesis(&owner);

        let deactivate = doc
            .create()
            .timestamp(from_unix(T0 + 100))
            .deactivate(from_unix(T0 + 100))
            .sign_with(&owner)
            .finish()
            .unwrap();
        doc.apply(&deactivate).unwrap();

        assert!(doc.deactivated_at(from_unix(T0 + 100)));
        assert!(!doc.valid_at(&owner.public(), from_unix(T0 + 200)));

        // no further operations apply
        let late = doc
            .create()
            .timestamp(from_unix(T0 + 300))
            .grant_embedded(KeyPair::generate().public(), ROLE_MESSAGING)
            .sign_with(&owner)
            .finish()
            .unwrap();
        assert!(doc.apply(&late).is_err());
    }

    #[test]
    fn apply_enforces_sequence_and_previous() {
        let owner = KeyPair::generate();
        let mut doc = genesis(&owner);

        // replaying the genesis operation fails on sequence
        let replay = IdentityDocument::new(owner.public())
            .create()
            .timestamp(from_unix(T0))
            .grant_embedded(owner.public(), ROLE_ASSERTION)
            .sign_with(&owner)
            .finish()
            .unwrap();
        assert!(doc.apply(&replay).is_err());

        // correct sequence but missing previous hash fails
        let missing_previous = OperationBuilder::new()
            .identifier(owner.public())
            .sequence(doc.sequence())
            .timestamp(from_unix(T0 + 1))
            .grant_embedded(KeyPair::generate().public(), ROLE_MESSAGING)
            .sign_with(&owner)
            .finish()
            .unwrap();
        assert!(doc.apply(&missing_previous).is_err());
    }

    #[test]
    fn later_operations_need_invocation_signer() {
        let owner = KeyPair::generate();
        let intruder = KeyPair::generate();
        let mut doc = genesis(&owner);

        let forged = doc
            .create()
            .timestamp(from_unix(T0 + 10))
            .grant_embedded(intruder.public(), ROLE_INVOCATION)
            .sign_with(&intruder)
            .finish()
            .unwrap();

        assert!(doc.apply(&forged).is_err());
    }

    #[test]
    fn modify_replaces_role_mask() {
        let owner = KeyPair::generate();
        let device = KeyPair::generate();
        let mut doc = genesis(&owner);

        let grant = doc
            .create()
            .timestamp(from_unix(T0 + 10))
            .grant_embedded(device.public(), ROLE_MESSAGING)
            .sign_with(&owner)
            .finish()
            .unwrap();
        doc.apply(&grant).unwrap();

        let modify = doc
            .create()
            .timestamp(from_unix(T0 + 20))
            .modify(device.public(), ROLE_MESSAGING | ROLE_ASSERTION)
            .sign_with(&owner)
            .finish()
            .unwrap();
        doc.apply(&modify).unwrap();

        assert!(doc.has_roles_at(
            &device.public(),
            ROLE_MESSAGING | ROLE_ASSERTION,
            from_unix(T0 + 20)
        ));
    }

    #[test]
    fn threshold_gates_later_operations() {
        let owner = KeyPair::generate();
        let second = KeyPair::generate();
        let mut doc = genesis(&owner);

        // add a second invocation key and require both to sign
        let policy = doc
            .create()
            .timestamp(from_unix(T0 + 10))
            .grant_embedded(second.public(), ROLE_INVOCATION)
            .threshold(ROLE_INVOCATION, 2)
            .sign_with(&owner)
            .finish()
            .unwrap();
        doc.apply(&policy).unwrap();

        let device = KeyPair::generate();
        let single_signer = doc
            .create()
            .timestamp(from_unix(T0 + 20))
            .grant_embedded(device.public(), ROLE_MESSAGING)
            .sign_with(&owner)
            .finish()
            .unwrap();
        assert!(doc.apply(&single_signer).is_err());

        let both_signers = doc
            .create()
            .timestamp(from_unix(T0 + 20))
            .grant_embedded(device.public(), ROLE_MESSAGING)
            .sign_with(&owner)
            .sign_with(&second)
            .finish()
            .unwrap();
        doc.apply(&both_signers).unwrap();

        assert!(doc.valid_at(&device.public(), from_unix(T0 + 20)));
    }

    #[test]
    fn weight_counts_toward_threshold() {
        let owner = KeyPair::generate();
        let mut doc = genesis(&owner);

        // a single key weighted 2 satisfies a threshold of 2 alone
        let policy = doc
            .create()
            .timestamp(from_unix(T0 + 10))
            .threshold(ROLE_INVOCATION, 2)
            .weight(owner.public(), ROLE_INVOCATION, 2)
            .sign_with(&owner)
            .finish()
            .unwrap();
        doc.apply(&policy).unwrap();

        let device = KeyPair::generate();
        let grant = doc
            .create()
            .timestamp(from_unix(T0 + 20))
            .grant_embedded(device.public(), ROLE_MESSAGING)
            .sign_with(&owner)
            .finish()
            .unwrap();
        doc.apply(&grant).unwrap();
    }

    #[test]
    fn threshold_and_weight_policy_recorded() {
        let owner = KeyPair::generate();
        let mut doc = genesis(&owner);

        let policy = doc
            .create()
            .timestamp(from_unix(T0 + 10))
            .threshold(ROLE_INVOCATION, 2)
            .weight(owner.public(), ROLE_INVOCATION, 3)
            .sign_with(&owner)
            .finish()
            .unwrap();
        doc.apply(&policy).unwrap();

        assert_eq!(doc.threshold(ROLE_INVOCATION), 2);
        assert_eq!(doc.weight(&owner.public(), ROLE_INVOCATION), 3);
        assert_eq!(doc.threshold(ROLE_ASSERTION), 1);
    }
}
