//! The client facade.
//!
//! Owns the account primitive and the correlation table, wires the
//! dispatcher to the subsystems, and gates every public operation on the
//! closed flag.

use crate::chat::Chat;
use crate::correlation::ResponseWaiters;
use crate::credentials::Credentials;
use crate::discovery::Discovery;
use crate::dispatch::{Dispatcher, IntroductionEvent, KeyPackageEvent, LifecycleHooks, WelcomeEvent};
use crate::group_chat::GroupChat;
use crate::pairing::Pairing;
use parking_lot::Mutex;
use self_account::{AccountConfig, AccountPrimitive, Environment, LogLevel};
use self_core::{PublicKey, Result, SelfError, Timestamp};
use self_message::Content;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Client configuration.
///
/// `storage_key` and `storage_path` are required; everything else
/// defaults.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// 32-byte key encrypting local storage. Required.
    pub storage_key: Vec<u8>,
    /// Directory for the account primitive's encrypted state. Required.
    pub storage_path: String,
    /// Target network. Defaults to sandbox.
    pub environment: Environment,
    /// Log verbosity handed to the primitive. Defaults to warn.
    pub log_level: LogLevel,
    /// Skip waiting for transport readiness at startup.
    pub skip_ready: bool,
    /// Skip first-run account setup.
    pub skip_setup: bool,
}

impl ClientConfig {
    /// A configuration with the required fields set and defaults for the
    /// rest.
    pub fn new(storage_key: Vec<u8>, storage_path: impl Into<String>) -> Self {
        Self {
            storage_key,
            storage_path: storage_path.into(),
            environment: Environment::default(),
            log_level: LogLevel::default(),
            skip_ready: false,
            skip_setup: false,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.storage_key.is_empty() {
            return Err(SelfError::MissingStorageKey);
        }
        if self.storage_key.len() != 32 {
            return Err(SelfError::invalid(format!(
                "storage key must be 32 bytes, got {}",
                self.storage_key.len()
            )));
        }
        if self.storage_path.is_empty() {
            return Err(SelfError::MissingStoragePath);
        }
        Ok(())
    }

    fn account_config(&self) -> AccountConfig {
        AccountConfig {
            storage_key: self.storage_key.clone(),
            storage_path: self.storage_path.clone(),
            rpc_url: self.environment.rpc_url().to_string(),
            object_url: self.environment.object_url().to_string(),
            message_url: self.environment.message_url().to_string(),
            log_level: self.log_level,
            skip_ready: self.skip_ready,
            skip_setup: self.skip_setup,
        }
    }
}

/// State shared between the facade, the dispatcher and the subsystems.
pub(crate) struct CoreState {
    pub(crate) account: Arc<dyn AccountPrimitive>,
    pub(crate) inbox: PublicKey,
    pub(crate) environment: Environment,
    pub(crate) closed: AtomicBool,
    pub(crate) waiters: ResponseWaiters,
    /// Peer address to group address, for diagnostics.
    pub(crate) connections: Mutex<HashMap<PublicKey, PublicKey>>,
    pub(crate) lifecycle: LifecycleHooks,
}

impl CoreState {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(SelfError::ClientClosed)
        } else {
            Ok(())
        }
    }

    /// Parse a peer DID string into a signing address.
    pub(crate) fn parse_peer(did: &str) -> Result<PublicKey> {
        PublicKey::from_address(did).ok_or_else(|| SelfError::invalid_peer_did(did))
    }

    /// Send a content envelope to `to`.
    pub(crate) async fn send(&self, to: &PublicKey, content: &Content) -> Result<()> {
        self.ensure_open()?;
        self.account.message_send(to, content).await
    }

    /// Send a request envelope whose id has a registered waiter.
    ///
    /// A failed send removes the waiter before surfacing the error.
    pub(crate) async fn send_correlated(&self, to: &PublicKey, content: &Content) -> Result<()> {
        if let Err(error) = self.send(to, content).await {
            self.waiters.remove(&content.request_id());
            return Err(error);
        }
        Ok(())
    }
}

/// The Self SDK client.
///
/// Constructed over an account primitive; owns the inbox lifetime and
/// exposes the subsystems. All methods are safe to call concurrently.
pub struct Client {
    core: Arc<CoreState>,
    discovery: Discovery,
    chat: Chat,
    group_chat: GroupChat,
    credentials: Credentials,
    pairing: Pairing,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

impl Client {
    /// Construct a client over `account`.
    ///
    /// Validates the configuration, resolves environment endpoints into
    /// the primitive's configuration, opens the inbox exactly once, and
    /// spawns the dispatcher.
    pub async fn new(config: ClientConfig, account: Arc<dyn AccountPrimitive>) -> Result<Client> {
        config.validate()?;

        account.configure(&config.account_config()).await?;
        let inbox = account.inbox_open().await?;
        let events = account.subscribe()?;

        tracing::info!(did = %inbox.address(), environment = ?config.environment, "inbox opened");

        let core = Arc::new(CoreState {
            account,
            inbox,
            environment: config.environment,
            closed: AtomicBool::new(false),
            waiters: ResponseWaiters::new(),
            connections: Mutex::new(HashMap::new()),
            lifecycle: LifecycleHooks::new(),
        });

        let discovery = Discovery::new(Arc::clone(&core));
        let chat = Chat::new(Arc::clone(&core));
        let group_chat = GroupChat::new(Arc::clone(&core));
        let credentials = Credentials::new(Arc::clone(&core));
        let pairing = Pairing::new(Arc::clone(&core));

        let dispatcher = Dispatcher::new(
            Arc::clone(&core),
            discovery.clone(),
            chat.clone(),
            group_chat.clone(),
            credentials.clone(),
            pairing.clone(),
        )
        .spawn(events);

        Ok(Client {
            core,
            discovery,
            chat,
            group_chat,
            credentials,
            pairing,
            dispatcher: Mutex::new(Some(dispatcher)),
        })
    }

    /// The client's DID: the stringified inbox signing address.
    ///
    /// Empty after the client is closed.
    pub fn did(&self) -> String {
        if self.core.is_closed() {
            String::new()
        } else {
            self.core.inbox.address()
        }
    }

    /// The inbox signing address.
    pub fn address(&self) -> PublicKey {
        self.core.inbox
    }

    /// The discovery subsystem.
    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    /// The chat subsystem.
    pub fn chat(&self) -> &Chat {
        &self.chat
    }

    /// The string-named group chat layer.
    pub fn group_chat(&self) -> &GroupChat {
        &self.group_chat
    }

    /// The credential exchange subsystem.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// The pairing subsystem.
    pub fn pairing(&self) -> &Pairing {
        &self.pairing
    }

    /// Subscribe to transport connect events.
    pub fn on_connect<F, Fut>(&self, handler: F)
    where
        F: Fn(()) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.core.lifecycle.connect.register(handler);
    }

    /// Subscribe to transport disconnect events.
    pub fn on_disconnect<F, Fut>(&self, handler: F)
    where
        F: Fn(Option<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.core.lifecycle.disconnect.register(handler);
    }

    /// Subscribe to accepted welcomes (a new inbound session).
    pub fn on_welcome<F, Fut>(&self, handler: F)
    where
        F: Fn(WelcomeEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.core.lifecycle.welcome.register(handler);
    }

    /// Subscribe to established key packages (a new outbound session).
    pub fn on_key_package<F, Fut>(&self, handler: F)
    where
        F: Fn(KeyPackageEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.core.lifecycle.key_package.register(handler);
    }

    /// Subscribe to stored introductions.
    pub fn on_introduction<F, Fut>(&self, handler: F)
    where
        F: Fn(IntroductionEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.core.lifecycle.introduction.register(handler);
    }

    /// Send a push-notification summary to a peer.
    pub async fn send_notification(&self, peer_did: &str, summary: &str) -> Result<()> {
        self.core.ensure_open()?;
        let peer = CoreState::parse_peer(peer_did)?;
        self.core.account.notification_send(&peer, summary).await
    }

    /// Store a value under `key`.
    pub async fn value_store(&self, key: &str, value: &[u8]) -> Result<()> {
        self.core.ensure_open()?;
        self.core.account.value_store(key, value).await
    }

    /// Store a value under `key`, expiring at `expires`.
    pub async fn value_store_with_expiry(
        &self,
        key: &str,
        value: &[u8],
        expires: Timestamp,
    ) -> Result<()> {
        self.core.ensure_open()?;
        self.core
            .account
            .value_store_with_expiry(key, value, expires)
            .await
    }

    /// Look up the value under `key`.
    pub async fn value_lookup(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.core.ensure_open()?;
        self.core.account.value_lookup(key).await
    }

    /// Remove the value under `key`.
    pub async fn value_remove(&self, key: &str) -> Result<()> {
        self.core.ensure_open()?;
        self.core.account.value_remove(key).await
    }

    /// The group address established with `peer`, when one exists.
    pub fn group_with(&self, peer: &PublicKey) -> Option<PublicKey> {
        self.core.connections.lock().get(peer).copied()
    }

    /// Number of in-flight correlated requests. Diagnostic.
    pub fn pending_requests(&self) -> usize {
        self.core.waiters.len()
    }

    /// Close the client.
    ///
    /// Idempotent. Cancels every pending wait, stops the dispatcher and
    /// shuts the primitive down; afterwards every operation fails with
    /// `ClientClosed` and no new handlers are invoked.
    pub async fn close(&self) -> Result<()> {
        if self.core.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.core.waiters.clear();
        if let Some(dispatcher) = self.dispatcher.lock().take() {
            dispatcher.abort();
        }

        self.core.account.close().await?;
        tracing::info!("client closed");
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(dispatcher) = self.dispatcher.lock().take() {
            dispatcher.abort();
        }
    }
}
