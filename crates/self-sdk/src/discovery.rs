//! Discovery subsystem: out-of-band key-package negotiation over QR.

use crate::client::CoreState;
use crate::correlation::{ResponseEvent, Waiter, DEFAULT_REQUEST_TIMEOUT};
use crate::handlers::HandlerSet;
use self_account::Environment;
use self_core::{PublicKey, Result, SelfError};
use self_message::{
    AnonymousMessage, Content, DiscoveryRequestContent, DiscoveryResponseContent, MessageContent,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// A peer discovered through a QR response.
#[derive(Debug, Clone)]
pub struct DiscoveredPeer {
    /// The peer's DID string
    pub did: String,
    /// The peer's signing address
    pub address: PublicKey,
}

struct DiscoveryInner {
    core: Arc<CoreState>,
    responses: HandlerSet<DiscoveredPeer>,
}

/// The discovery subsystem handle.
#[derive(Clone)]
pub struct Discovery {
    inner: Arc<DiscoveryInner>,
}

impl Discovery {
    pub(crate) fn new(core: Arc<CoreState>) -> Self {
        Self {
            inner: Arc::new(DiscoveryInner {
                core,
                responses: HandlerSet::new(),
            }),
        }
    }

    /// Generate a discovery QR valid for five minutes.
    pub async fn generate_qr(&self) -> Result<DiscoveryQr> {
        self.generate_qr_with_timeout(DEFAULT_REQUEST_TIMEOUT).await
    }

    /// Generate a discovery QR valid for `timeout`.
    ///
    /// Negotiates an out-of-band key package, builds the discovery
    /// request and registers a waiter bound to the request id.
    pub async fn generate_qr_with_timeout(&self, timeout: Duration) -> Result<DiscoveryQr> {
        let core = &self.inner.core;
        core.ensure_open()?;

        let expires = self_core::now()
            + chrono::Duration::from_std(timeout)
                .map_err(|e| SelfError::invalid(format!("timeout out of range: {e}")))?;

        let key_package = core
            .account
            .connection_negotiate_out_of_band(&core.inbox, expires)
            .await?;

        let content = DiscoveryRequestContent {
            key_package,
            expires: self_core::to_unix(expires),
        }
        .into_content()?;

        let request_id = content.request_id();
        let receiver = core.waiters.register(request_id.clone());

        tracing::debug!(%request_id, "discovery qr generated");

        Ok(DiscoveryQr {
            waiter: Waiter::new(request_id, receiver, core.waiters.clone()),
            content,
            sandbox: core.environment == Environment::Sandbox,
        })
    }

    /// Subscribe to every arriving discovery response, waiter or not.
    pub fn on_response<F, Fut>(&self, handler: F)
    where
        F: Fn(DiscoveredPeer) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.responses.register(handler);
    }

    pub(crate) fn handle_response(&self, from: &PublicKey, content: &Content) {
        let response = match DiscoveryResponseContent::from_content(content) {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!(from = %from.address(), %error, "malformed discovery response dropped");
                return;
            }
        };

        let peer = DiscoveredPeer {
            did: from.address(),
            address: *from,
        };

        let request_id = hex::encode(&response.response_to);
        if let Some(tx) = self.inner.core.waiters.complete(&request_id) {
            let _ = tx.send(ResponseEvent::Discovery(peer.clone()));
        } else {
            tracing::debug!(%request_id, "discovery response without waiter");
        }

        self.inner.responses.dispatch(&peer);
    }
}

/// A generated discovery QR, bound to its request id.
pub struct DiscoveryQr {
    waiter: Waiter,
    content: Content,
    sandbox: bool,
}

impl DiscoveryQr {
    /// The hex-encoded request id this QR correlates on.
    pub fn request_id(&self) -> &str {
        self.waiter.request_id()
    }

    fn anonymous(&self) -> AnonymousMessage {
        AnonymousMessage::new(self.content.clone()).target_sandbox(self.sandbox)
    }

    /// The QR rendered with unicode block characters.
    pub fn unicode(&self) -> Result<String> {
        self.anonymous().unicode()
    }

    /// The QR rendered as an SVG document.
    pub fn svg(&self) -> Result<String> {
        self.anonymous().svg()
    }

    /// The compact string form carried inside the QR.
    pub fn encoded(&self) -> Result<String> {
        self.anonymous().encode()
    }

    /// Wait for a peer to answer the QR.
    pub async fn wait_for_response(self, timeout: Duration) -> Result<DiscoveredPeer> {
        match self.waiter.wait(timeout).await? {
            ResponseEvent::Discovery(peer) => Ok(peer),
            _ => Err(SelfError::invalid_response(
                "discovery request answered by a different flow",
            )),
        }
    }

    /// Withdraw the waiter; a late response will be dropped.
    pub fn cancel(&self) {
        self.waiter.cancel();
    }
}
