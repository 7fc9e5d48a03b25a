//! Chat subsystem: send, reply and receive chat messages.

use crate::client::CoreState;
use crate::handlers::HandlerSet;
use self_core::{PublicKey, Result};
use self_message::{Attachment, ChatContent, Content, MessageContent};
use std::future::Future;
use std::sync::Arc;

/// A received chat message.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// The sending peer's address
    pub from: PublicKey,
    /// Message text
    pub text: String,
    /// The envelope id; pass to [`Chat::reply`] to reply
    pub id: [u8; 32],
    /// Id of the envelope this message replies to, if any
    pub referenced_id: Option<Vec<u8>>,
    /// Attachment references carried by the message
    pub attachments: Vec<Attachment>,
}

struct ChatInner {
    core: Arc<CoreState>,
    messages: HandlerSet<ChatMessage>,
}

/// The chat subsystem handle.
#[derive(Clone)]
pub struct Chat {
    inner: Arc<ChatInner>,
}

impl Chat {
    pub(crate) fn new(core: Arc<CoreState>) -> Self {
        Self {
            inner: Arc::new(ChatInner {
                core,
                messages: HandlerSet::new(),
            }),
        }
    }

    /// Send a chat message to a peer.
    pub async fn send(&self, peer_did: &str, text: &str) -> Result<()> {
        self.send_with_attachments(peer_did, text, Vec::new()).await
    }

    /// Send a chat message with attachment references.
    ///
    /// Attachments are accepted and carried on the wire; interpretation
    /// is left to the receiving application.
    pub async fn send_with_attachments(
        &self,
        peer_did: &str,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> Result<()> {
        let peer = CoreState::parse_peer(peer_did)?;

        let mut chat = ChatContent::new(text);
        chat.attachments = attachments;

        self.inner.core.send(&peer, &chat.into_content()?).await
    }

    /// Reply to an earlier message, referencing its envelope id.
    pub async fn reply(&self, peer_did: &str, referencing: Vec<u8>, text: &str) -> Result<()> {
        let peer = CoreState::parse_peer(peer_did)?;
        let chat = ChatContent::reply(text, referencing);
        self.inner.core.send(&peer, &chat.into_content()?).await
    }

    /// Subscribe to incoming chat messages.
    pub fn on_message<F, Fut>(&self, handler: F)
    where
        F: Fn(ChatMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.messages.register(handler);
    }

    pub(crate) fn handle_message(&self, from: &PublicKey, content: &Content) {
        let chat = match ChatContent::from_content(content) {
            Ok(chat) => chat,
            Err(error) => {
                tracing::debug!(from = %from.address(), %error, "malformed chat message dropped");
                return;
            }
        };

        self.inner.messages.dispatch(&ChatMessage {
            from: *from,
            text: chat.message,
            id: *content.id(),
            referenced_id: chat.referencing,
            attachments: chat.attachments,
        });
    }
}
