//! In-memory account primitive.

use parking_lot::Mutex;
use self_account::{AccountConfig, AccountEvent, AccountPrimitive, Object};
use self_core::{KeyAlgorithm, KeyPair, PublicKey, Result, SelfError, Timestamp};
use self_credentials::{
    UnsignedCredential, UnsignedPresentation, VerifiableCredential, VerifiablePresentation,
};
use self_message::Content;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A recorded `token_store` call, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    /// The peer the token allows messaging
    pub from: PublicKey,
    /// The recipient argument
    pub to: PublicKey,
    /// The group argument
    pub group: PublicKey,
    /// The opaque token bytes
    pub token: Vec<u8>,
}

/// A process-local network connecting memory accounts.
///
/// Routes messages by inbox address and hosts the shared object store.
#[derive(Default)]
pub struct MemoryNetwork {
    routes: Mutex<HashMap<String, mpsc::UnboundedSender<AccountEvent>>>,
    objects: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryNetwork {
    /// A fresh, empty network.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn route(&self, address: &PublicKey) -> Option<mpsc::UnboundedSender<AccountEvent>> {
        self.routes.lock().get(&address.address()).cloned()
    }
}

/// An in-memory account primitive.
pub struct MemoryAccount {
    network: Arc<MemoryNetwork>,
    keypair: KeyPair,
    events_tx: mpsc::UnboundedSender<AccountEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<AccountEvent>>>,
    config: Mutex<Option<AccountConfig>>,
    opened: AtomicBool,
    closed: AtomicBool,
    fail_sends: AtomicBool,
    values: Mutex<HashMap<String, (Vec<u8>, Option<i64>)>>,
    tokens: Mutex<Vec<TokenRecord>>,
    notifications: Mutex<Vec<(PublicKey, String)>>,
    pairing: Mutex<(String, bool)>,
}

impl MemoryAccount {
    /// An account with a fresh random keypair on `network`.
    pub fn new(network: Arc<MemoryNetwork>) -> Arc<Self> {
        Self::with_keypair(network, KeyPair::generate())
    }

    /// An account with a caller-chosen keypair.
    pub fn with_keypair(network: Arc<MemoryNetwork>, keypair: KeyPair) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            network,
            keypair,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            config: Mutex::new(None),
            opened: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            values: Mutex::new(HashMap::new()),
            tokens: Mutex::new(Vec::new()),
            notifications: Mutex::new(Vec::new()),
            pairing: Mutex::new(("000000".to_string(), true)),
        })
    }

    /// The account's signing keypair.
    pub fn keypair(&self) -> &KeyPair {
        &self.keypair
    }

    /// The inbox signing address.
    pub fn address(&self) -> PublicKey {
        self.keypair.public()
    }

    /// The inbox DID string.
    pub fn did(&self) -> String {
        self.address().address()
    }

    /// Inject an event into this account's stream, as the native
    /// library's worker threads would.
    pub fn inject(&self, event: AccountEvent) {
        let _ = self.events_tx.send(event);
    }

    /// Every `token_store` call so far, in call order.
    pub fn stored_tokens(&self) -> Vec<TokenRecord> {
        self.tokens.lock().clone()
    }

    /// Every `notification_send` call so far.
    pub fn sent_notifications(&self) -> Vec<(PublicKey, String)> {
        self.notifications.lock().clone()
    }

    /// The configuration handed down by the client, once configured.
    pub fn configured_with(&self) -> Option<AccountConfig> {
        self.config.lock().clone()
    }

    /// Set the pairing code and unpaired flag returned by
    /// `sdk_pairing_code`.
    pub fn set_pairing_code(&self, code: impl Into<String>, unpaired: bool) {
        *self.pairing.lock() = (code.into(), unpaired);
    }

    /// Make every subsequent `message_send` fail.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SelfError::account("account is closed"));
        }
        if !self.opened.load(Ordering::SeqCst) {
            return Err(SelfError::account("inbox is not open"));
        }
        Ok(())
    }

    // Groups are synthesized deterministically from the handshake bytes.
    fn derive_group(payload: &[u8]) -> PublicKey {
        PublicKey::new(KeyAlgorithm::Curve25519, Sha256::digest(payload).into())
    }
}

#[async_trait::async_trait]
impl AccountPrimitive for MemoryAccount {
    async fn configure(&self, config: &AccountConfig) -> Result<()> {
        *self.config.lock() = Some(config.clone());
        Ok(())
    }

    async fn inbox_open(&self) -> Result<PublicKey> {
        let address = self.address();
        self.network
            .routes
            .lock()
            .insert(address.address(), self.events_tx.clone());
        self.opened.store(true, Ordering::SeqCst);
        Ok(address)
    }

    fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<AccountEvent>> {
        self.events_rx
            .lock()
            .take()
            .ok_or_else(|| SelfError::account("event stream already subscribed"))
    }

    async fn connection_negotiate_out_of_band(
        &self,
        address: &PublicKey,
        _expires: Timestamp,
    ) -> Result<Vec<u8>> {
        self.ensure_open()?;
        // a real key package is opaque; address bytes plus a nonce is
        // enough for routing in tests
        let mut package = address.to_bytes().to_vec();
        package.extend_from_slice(&rand::random::<[u8; 16]>());
        Ok(package)
    }

    async fn connection_accept(&self, _to: &PublicKey, welcome: &[u8]) -> Result<PublicKey> {
        self.ensure_open()?;
        if welcome.is_empty() {
            return Err(SelfError::account("empty welcome"));
        }
        Ok(Self::derive_group(welcome))
    }

    async fn connection_establish(
        &self,
        _to: &PublicKey,
        key_package: &[u8],
    ) -> Result<PublicKey> {
        self.ensure_open()?;
        if key_package.is_empty() {
            return Err(SelfError::account("empty key package"));
        }
        Ok(Self::derive_group(key_package))
    }

    async fn connection_negotiate(
        &self,
        _from: &PublicKey,
        _to: &PublicKey,
        _expires: Timestamp,
    ) -> Result<()> {
        self.ensure_open()
    }

    async fn message_send(&self, to: &PublicKey, content: &Content) -> Result<()> {
        self.ensure_open()?;

        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(SelfError::account("simulated send failure"));
        }

        let route = self
            .network
            .route(to)
            .ok_or_else(|| SelfError::account(format!("no route to {}", to.address())))?;

        route
            .send(AccountEvent::Message {
                from: self.address(),
                to: *to,
                content: content.clone(),
            })
            .map_err(|_| SelfError::account("recipient event stream closed"))
    }

    async fn object_upload(&self, object: &mut Object, _encrypted: bool) -> Result<()> {
        self.ensure_open()?;
        let data = object
            .data()
            .ok_or_else(|| SelfError::account("object has no data to upload"))?
            .to_vec();

        object.set_key(rand::random::<[u8; 32]>().to_vec());
        self.network
            .objects
            .lock()
            .insert(object.id().to_vec(), data);
        Ok(())
    }

    async fn object_download(&self, object: &mut Object) -> Result<()> {
        self.ensure_open()?;
        let data = self
            .network
            .objects
            .lock()
            .get(object.id())
            .cloned()
            .ok_or_else(|| SelfError::account("object not found"))?;

        object.set_data(data);
        Ok(())
    }

    async fn credential_issue(
        &self,
        unsigned: &UnsignedCredential,
    ) -> Result<VerifiableCredential> {
        self.ensure_open()?;
        unsigned.sign(&self.keypair)
    }

    async fn presentation_issue(
        &self,
        unsigned: &UnsignedPresentation,
    ) -> Result<VerifiablePresentation> {
        self.ensure_open()?;
        unsigned.sign(&self.keypair)
    }

    async fn notification_send(&self, to: &PublicKey, summary: &str) -> Result<()> {
        self.ensure_open()?;
        self.notifications.lock().push((*to, summary.to_string()));
        Ok(())
    }

    async fn sdk_pairing_code(&self) -> Result<(String, bool)> {
        self.ensure_open()?;
        Ok(self.pairing.lock().clone())
    }

    async fn token_store(
        &self,
        from: &PublicKey,
        to: &PublicKey,
        group: &PublicKey,
        token: &[u8],
    ) -> Result<()> {
        self.ensure_open()?;
        self.tokens.lock().push(TokenRecord {
            from: *from,
            to: *to,
            group: *group,
            token: token.to_vec(),
        });
        Ok(())
    }

    async fn value_store(&self, key: &str, value: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.values
            .lock()
            .insert(key.to_string(), (value.to_vec(), None));
        Ok(())
    }

    async fn value_store_with_expiry(
        &self,
        key: &str,
        value: &[u8],
        expires: Timestamp,
    ) -> Result<()> {
        self.ensure_open()?;
        self.values.lock().insert(
            key.to_string(),
            (value.to_vec(), Some(self_core::to_unix(expires))),
        );
        Ok(())
    }

    async fn value_lookup(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        let now = self_core::to_unix(self_core::now());
        Ok(self.values.lock().get(key).and_then(|(value, expires)| {
            match expires {
                Some(at) if *at <= now => None,
                _ => Some(value.clone()),
            }
        }))
    }

    async fn value_remove(&self, key: &str) -> Result<()> {
        self.ensure_open()?;
        self.values.lock().remove(key);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.network.routes.lock().remove(&self.did());
        }
        Ok(())
    }
}
