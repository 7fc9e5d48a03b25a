//! The event dispatcher.
//!
//! A single task consumes the account primitive's event stream, which
//! preserves per-connection arrival order. Lifecycle events broadcast to
//! subscribers; messages route by content type to the owning subsystem.
//! Handler invocation happens on worker tasks, so dispatch itself never
//! blocks on a handler.
//!
//! Failures on this path are absorbed: a malformed inbound payload, a
//! failing connection accept or a token-store error are logged and
//! dropped rather than surfaced, so no peer can wedge the dispatcher.

use crate::chat::Chat;
use crate::client::CoreState;
use crate::credentials::Credentials;
use crate::discovery::Discovery;
use crate::group_chat::GroupChat;
use crate::handlers::HandlerSet;
use crate::pairing::Pairing;
use self_account::AccountEvent;
use self_core::PublicKey;
use self_message::{Content, ContentType, IntroductionContent, MessageContent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// An accepted inbound session.
#[derive(Debug, Clone)]
pub struct WelcomeEvent {
    /// The peer that initiated the session
    pub from: PublicKey,
    /// The established group address
    pub group: PublicKey,
}

/// An established outbound session.
#[derive(Debug, Clone)]
pub struct KeyPackageEvent {
    /// The peer whose key package was established
    pub from: PublicKey,
}

/// Stored introduction tokens from a peer.
#[derive(Debug, Clone)]
pub struct IntroductionEvent {
    /// The introducing peer
    pub from: PublicKey,
    /// Number of tokens the introduction carried
    pub tokens: usize,
}

/// Lifecycle broadcast hooks shared by the facade and its subscribers.
pub(crate) struct LifecycleHooks {
    pub(crate) connect: HandlerSet<()>,
    pub(crate) disconnect: HandlerSet<Option<String>>,
    pub(crate) welcome: HandlerSet<WelcomeEvent>,
    pub(crate) key_package: HandlerSet<KeyPackageEvent>,
    pub(crate) introduction: HandlerSet<IntroductionEvent>,
}

impl LifecycleHooks {
    pub(crate) fn new() -> Self {
        Self {
            connect: HandlerSet::new(),
            disconnect: HandlerSet::new(),
            welcome: HandlerSet::new(),
            key_package: HandlerSet::new(),
            introduction: HandlerSet::new(),
        }
    }
}

/// The dispatcher: routes account events to subsystems.
pub(crate) struct Dispatcher {
    core: Arc<CoreState>,
    discovery: Discovery,
    chat: Chat,
    group_chat: GroupChat,
    credentials: Credentials,
    pairing: Pairing,
}

impl Dispatcher {
    pub(crate) fn new(
        core: Arc<CoreState>,
        discovery: Discovery,
        chat: Chat,
        group_chat: GroupChat,
        credentials: Credentials,
        pairing: Pairing,
    ) -> Self {
        Self {
            core,
            discovery,
            chat,
            group_chat,
            credentials,
            pairing,
        }
    }

    /// Spawn the consumer loop.
    pub(crate) fn spawn(self, mut events: mpsc::UnboundedReceiver<AccountEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if self.core.is_closed() {
                    break;
                }
                self.handle(event).await;
            }
            tracing::debug!("dispatcher stopped");
        })
    }

    async fn handle(&self, event: AccountEvent) {
        match event {
            AccountEvent::Connect => {
                tracing::debug!("transport connected");
                self.core.lifecycle.connect.dispatch(&());
            }
            AccountEvent::Disconnect { reason } => {
                tracing::debug!(?reason, "transport disconnected");
                self.core.lifecycle.disconnect.dispatch(&reason);
            }
            AccountEvent::Welcome { from, welcome } => self.handle_welcome(from, welcome).await,
            AccountEvent::KeyPackage { from, package } => {
                self.handle_key_package(from, package).await;
            }
            AccountEvent::Message { from, to, content } => {
                self.handle_message(from, to, content).await;
            }
        }
    }

    async fn handle_welcome(&self, from: PublicKey, welcome: Vec<u8>) {
        // accept automatically; a failed accept is dropped, the peer will
        // retry the handshake
        match self
            .core
            .account
            .connection_accept(&self.core.inbox, &welcome)
            .await
        {
            Ok(group) => {
                tracing::debug!(from = %from.address(), group = %group.address(), "welcome accepted");
                self.core.connections.lock().insert(from, group);
                self.core
                    .lifecycle
                    .welcome
                    .dispatch(&WelcomeEvent { from, group });
            }
            Err(error) => {
                tracing::debug!(from = %from.address(), %error, "connection accept failed");
            }
        }
    }

    async fn handle_key_package(&self, from: PublicKey, package: Vec<u8>) {
        match self
            .core
            .account
            .connection_establish(&self.core.inbox, &package)
            .await
        {
            Ok(group) => {
                tracing::debug!(from = %from.address(), group = %group.address(), "connection established");
                self.core.connections.lock().insert(from, group);
                self.core
                    .lifecycle
                    .key_package
                    .dispatch(&KeyPackageEvent { from });
            }
            Err(error) => {
                tracing::debug!(from = %from.address(), %error, "connection establish failed");
            }
        }
    }

    async fn handle_message(&self, from: PublicKey, to: PublicKey, content: Content) {
        match content.content_type() {
            ContentType::DiscoveryResponse => self.discovery.handle_response(&from, &content),
            ContentType::Chat => {
                // both the plain chat subsystem and the group layer observe
                // every chat envelope
                self.chat.handle_message(&from, &content);
                self.group_chat.handle_chat(&from, &content);
            }
            ContentType::CredentialPresentationRequest => {
                self.credentials.handle_presentation_request(&from, &content);
            }
            ContentType::CredentialPresentationResponse => {
                self.credentials.handle_presentation_response(&from, &content);
            }
            ContentType::CredentialVerificationRequest => {
                self.credentials.handle_verification_request(&from, &content);
            }
            ContentType::CredentialVerificationResponse => {
                self.credentials.handle_verification_response(&from, &content);
            }
            ContentType::AccountPairingRequest => {
                self.pairing.handle_request(&from, &content);
            }
            ContentType::AccountPairingResponse => {
                self.pairing.handle_response(&from, &content);
            }
            ContentType::Introduction => self.handle_introduction(from, to, content).await,
            ContentType::DiscoveryRequest | ContentType::Unknown(_) => {
                tracing::trace!(
                    content_type = ?content.content_type(),
                    "ignoring unroutable content"
                );
            }
        }
    }

    async fn handle_introduction(&self, from: PublicKey, to: PublicKey, content: Content) {
        let introduction = match IntroductionContent::from_content(&content) {
            Ok(introduction) => introduction,
            Err(error) => {
                tracing::debug!(from = %from.address(), %error, "malformed introduction dropped");
                return;
            }
        };

        let tokens = introduction.tokens();
        for token in tokens {
            // the recipient address doubles as the group argument; the
            // account primitive's token store expects exactly this order
            if let Err(error) = self.core.account.token_store(&from, &to, &to, token).await {
                tracing::debug!(from = %from.address(), %error, "token store failed");
            }
        }

        self.core.lifecycle.introduction.dispatch(&IntroductionEvent {
            from,
            tokens: tokens.len(),
        });
    }
}
