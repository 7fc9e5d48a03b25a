//! String-named group chat, layered above the chat subsystem.
//!
//! Groups are a client-side convention: a registry of name to member
//! addresses, and a metadata-in-message framing (`"<group>\u{1f}<text>"`)
//! over ordinary chat envelopes. Plain chat handlers still fire for
//! group-framed messages; this layer additionally fires its own handlers
//! when the frame parses.

use crate::client::CoreState;
use crate::handlers::HandlerSet;
use parking_lot::Mutex;
use self_core::{PublicKey, Result, SelfError};
use self_message::{ChatContent, Content, MessageContent};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

// Unit separator: cannot appear in ordinary chat text from well-behaved
// peers, so it frames the group name.
const GROUP_SEPARATOR: char = '\u{1f}';

/// A received group message.
#[derive(Debug, Clone)]
pub struct GroupMessage {
    /// The group name
    pub group: String,
    /// The sending peer's address
    pub from: PublicKey,
    /// Message text
    pub text: String,
    /// The envelope id
    pub id: [u8; 32],
}

struct GroupChatInner {
    core: Arc<CoreState>,
    groups: Mutex<HashMap<String, Vec<PublicKey>>>,
    messages: HandlerSet<GroupMessage>,
}

/// The group chat handle.
#[derive(Clone)]
pub struct GroupChat {
    inner: Arc<GroupChatInner>,
}

impl GroupChat {
    pub(crate) fn new(core: Arc<CoreState>) -> Self {
        Self {
            inner: Arc::new(GroupChatInner {
                core,
                groups: Mutex::new(HashMap::new()),
                messages: HandlerSet::new(),
            }),
        }
    }

    /// Create (or replace) a group with the given member DIDs.
    pub fn create(&self, name: impl Into<String>, member_dids: &[&str]) -> Result<()> {
        self.inner.core.ensure_open()?;

        let members = member_dids
            .iter()
            .map(|did| CoreState::parse_peer(did))
            .collect::<Result<Vec<_>>>()?;

        self.inner.groups.lock().insert(name.into(), members);
        Ok(())
    }

    /// The member addresses of a group, when known.
    pub fn members(&self, name: &str) -> Option<Vec<PublicKey>> {
        self.inner.groups.lock().get(name).cloned()
    }

    /// Send a message to every member of a group.
    pub async fn send(&self, name: &str, text: &str) -> Result<()> {
        let members = self
            .members(name)
            .ok_or_else(|| SelfError::invalid(format!("unknown group: {name}")))?;

        let framed = format!("{name}{GROUP_SEPARATOR}{text}");
        for member in &members {
            let chat = ChatContent::new(framed.clone());
            self.inner.core.send(member, &chat.into_content()?).await?;
        }

        Ok(())
    }

    /// Subscribe to incoming group messages.
    pub fn on_message<F, Fut>(&self, handler: F)
    where
        F: Fn(GroupMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.messages.register(handler);
    }

    pub(crate) fn handle_chat(&self, from: &PublicKey, content: &Content) {
        let Ok(chat) = ChatContent::from_content(content) else {
            return; // plain chat already logged the drop
        };

        let Some((group, text)) = chat.message.split_once(GROUP_SEPARATOR) else {
            return; // not group-framed
        };

        self.inner.messages.dispatch(&GroupMessage {
            group: group.to_string(),
            from: *from,
            text: text.to_string(),
            id: *content.id(),
        });
    }
}
