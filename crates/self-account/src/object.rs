//! Stored objects (assets).
//!
//! An object is created client-side from plaintext data, uploaded
//! encrypted, and optionally downloaded back into the object later. The
//! ciphertext and key handling live inside the account primitive; the
//! SDK sees plaintext plus opaque key material.

use self_message::ObjectRef;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    /// Object id in the object store
    #[serde(with = "serde_bytes")]
    id: Vec<u8>,
    /// Content hash of the plaintext
    #[serde(with = "serde_bytes")]
    hash: Vec<u8>,
    /// Mime type
    mime: String,
    /// Plaintext data, present client-side only
    data: Option<Vec<u8>>,
    /// Opaque key material produced by the primitive on upload
    key: Option<Vec<u8>>,
}

impl Object {
    /// Create an object from plaintext, ready for upload.
    ///
    /// The id is random; the hash is the sha-256 of the plaintext.
    pub fn from_data(mime: impl Into<String>, data: Vec<u8>) -> Self {
        let hash = Sha256::digest(&data).to_vec();
        Self {
            id: rand::random::<[u8; 32]>().to_vec(),
            hash,
            mime: mime.into(),
            data: Some(data),
            key: None,
        }
    }

    /// Reconstruct an object from a wire reference, data not yet fetched.
    pub fn from_ref(reference: &ObjectRef) -> Self {
        Self {
            id: reference.id.clone(),
            hash: reference.hash.clone(),
            mime: reference.mime.clone(),
            data: None,
            key: reference.key.clone(),
        }
    }

    /// The wire reference for this object.
    pub fn to_ref(&self) -> ObjectRef {
        ObjectRef {
            id: self.id.clone(),
            hash: self.hash.clone(),
            mime: self.mime.clone(),
            key: self.key.clone(),
        }
    }

    /// The object id.
    pub fn id(&self) -> &[u8] {
        &self.id
    }

    /// The plaintext content hash.
    pub fn hash(&self) -> &[u8] {
        &self.hash
    }

    /// The mime type.
    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// The plaintext data, when present.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// The opaque key material, when present.
    pub fn key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    /// Install plaintext fetched by the primitive.
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = Some(data);
    }

    /// Install key material produced by the primitive.
    pub fn set_key(&mut self, key: Vec<u8>) {
        self.key = Some(key);
    }

    /// Whether `data` matches the recorded content hash.
    pub fn verify_hash(&self) -> bool {
        self.data
            .as_ref()
            .is_some_and(|data| Sha256::digest(data).as_slice() == self.hash)
    }
}
