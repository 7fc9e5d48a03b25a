//! Pairing subsystem: account pairing codes and pairing requests.

use crate::client::CoreState;
use crate::correlation::{ResponseEvent, Waiter, DEFAULT_REQUEST_TIMEOUT};
use crate::credentials::Asset;
use crate::handlers::HandlerSet;
use self_core::{PublicKey, Result, SelfError, Timestamp};
use self_identity::Operation;
use self_message::{
    pairing_qr_text, AccountPairingRequestContent, AccountPairingResponseContent, Content,
    MessageContent, ObjectRef, ResponseStatus,
};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// The account's pairing code.
#[derive(Debug, Clone)]
pub struct PairingCode {
    /// The code to present to the pairing device
    pub code: String,
    /// Whether the account is still unpaired
    pub unpaired: bool,
    /// When the code expires.
    ///
    /// Hard-coded to 24h from retrieval; the primitive does not surface
    /// the true expiry yet.
    pub expires_at: Timestamp,
}

/// A correlated pairing response.
#[derive(Debug, Clone)]
pub struct PairingResponse {
    /// The responding peer's address
    pub from: PublicKey,
    /// Outcome status
    pub status: ResponseStatus,
    /// The signed identity operation performing the grant
    pub operation: Option<Operation>,
    /// Supporting assets
    pub assets: Vec<ObjectRef>,
}

/// An incoming pairing request.
///
/// The handler may call exactly one of
/// [`respond_with_operation`](Self::respond_with_operation),
/// [`respond_with_operation_and_assets`](Self::respond_with_operation_and_assets)
/// or [`reject`](Self::reject).
#[derive(Clone)]
pub struct IncomingPairingRequest {
    core: Arc<CoreState>,
    from: PublicKey,
    request_id: Vec<u8>,
    address: PublicKey,
    roles: u64,
    expires: i64,
    responded: Arc<AtomicBool>,
}

impl IncomingPairingRequest {
    /// The requesting peer's address.
    pub fn from(&self) -> &PublicKey {
        &self.from
    }

    /// The hex-encoded request id.
    pub fn request_id(&self) -> String {
        hex::encode(&self.request_id)
    }

    /// The signing address to be granted.
    pub fn address(&self) -> &PublicKey {
        &self.address
    }

    /// The requested role mask.
    pub fn roles(&self) -> u64 {
        self.roles
    }

    /// When the requester stops waiting.
    pub fn expires(&self) -> Timestamp {
        self_core::from_unix(self.expires)
    }

    fn claim_responded(&self) -> Result<()> {
        if self.responded.swap(true, Ordering::AcqRel) {
            return Err(SelfError::invalid_response("request already responded to"));
        }
        Ok(())
    }

    /// Accept with the identity operation performing the grant.
    pub async fn respond_with_operation(&self, operation: Operation) -> Result<()> {
        self.respond(Some(operation), Vec::new()).await
    }

    /// Accept with the operation plus supporting assets.
    pub async fn respond_with_operation_and_assets(
        &self,
        operation: Operation,
        assets: Vec<Asset>,
    ) -> Result<()> {
        let refs = assets.iter().map(|asset| asset.object.to_ref()).collect();
        self.respond(Some(operation), refs).await
    }

    /// Reject the request.
    pub async fn reject(&self) -> Result<()> {
        self.respond(None, Vec::new()).await
    }

    async fn respond(&self, operation: Option<Operation>, assets: Vec<ObjectRef>) -> Result<()> {
        self.claim_responded()?;

        let status = if operation.is_some() {
            ResponseStatus::Accepted
        } else {
            ResponseStatus::Forbidden
        };

        let response = AccountPairingResponseContent {
            response_to: self.request_id.clone(),
            status,
            operation,
            assets,
        };
        self.core.send(&self.from, &response.into_content()?).await
    }
}

impl std::fmt::Debug for IncomingPairingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncomingPairingRequest")
            .field("from", &self.from.address())
            .field("request_id", &self.request_id())
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}

/// Handle to an in-flight pairing request.
pub struct PairingRequestHandle {
    waiter: Waiter,
}

impl PairingRequestHandle {
    /// The hex-encoded request id.
    pub fn request_id(&self) -> &str {
        self.waiter.request_id()
    }

    /// Wait for the peer's response.
    pub async fn wait_for_response(self, timeout: Duration) -> Result<PairingResponse> {
        match self.waiter.wait(timeout).await? {
            ResponseEvent::Pairing(response) => Ok(response),
            _ => Err(SelfError::invalid_response(
                "pairing request answered by a different flow",
            )),
        }
    }

    /// Withdraw the waiter; a late response will be dropped.
    pub fn cancel(&self) {
        self.waiter.cancel();
    }
}

struct PairingInner {
    core: Arc<CoreState>,
    requests: HandlerSet<IncomingPairingRequest>,
    responses: HandlerSet<PairingResponse>,
}

/// The pairing subsystem handle.
#[derive(Clone)]
pub struct Pairing {
    inner: Arc<PairingInner>,
}

impl Pairing {
    pub(crate) fn new(core: Arc<CoreState>) -> Self {
        Self {
            inner: Arc::new(PairingInner {
                core,
                requests: HandlerSet::new(),
                responses: HandlerSet::new(),
            }),
        }
    }

    /// The account's pairing code.
    pub async fn pairing_code(&self) -> Result<PairingCode> {
        let core = &self.inner.core;
        core.ensure_open()?;

        let (code, unpaired) = core.account.sdk_pairing_code().await?;
        Ok(PairingCode {
            code,
            unpaired,
            expires_at: self_core::now() + chrono::Duration::hours(24),
        })
    }

    /// The pairing code in QR text form.
    pub async fn generate_pairing_qr(&self) -> Result<String> {
        let pairing_code = self.pairing_code().await?;
        Ok(pairing_qr_text(&pairing_code.code))
    }

    /// Whether the account is already paired.
    pub async fn is_paired(&self) -> Result<bool> {
        Ok(!self.pairing_code().await?.unpaired)
    }

    /// Request pairing: ask `peer_did` to grant `roles` to `address`,
    /// default timeout.
    pub async fn request_pairing(
        &self,
        peer_did: &str,
        address: PublicKey,
        roles: u64,
    ) -> Result<PairingRequestHandle> {
        self.request_pairing_with_timeout(peer_did, address, roles, DEFAULT_REQUEST_TIMEOUT)
            .await
    }

    /// Request pairing with an explicit timeout.
    pub async fn request_pairing_with_timeout(
        &self,
        peer_did: &str,
        address: PublicKey,
        roles: u64,
        timeout: Duration,
    ) -> Result<PairingRequestHandle> {
        let core = &self.inner.core;
        core.ensure_open()?;
        let peer = CoreState::parse_peer(peer_did)?;

        let content = AccountPairingRequestContent {
            address,
            roles,
            expires: self_core::to_unix(self_core::now()) + timeout.as_secs() as i64,
        }
        .into_content()?;

        let request_id = content.request_id();
        let receiver = core.waiters.register(request_id.clone());
        let waiter = Waiter::new(request_id, receiver, core.waiters.clone());

        core.send_correlated(&peer, &content).await?;
        Ok(PairingRequestHandle { waiter })
    }

    /// Subscribe to incoming pairing requests.
    pub fn on_request<F, Fut>(&self, handler: F)
    where
        F: Fn(IncomingPairingRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.requests.register(handler);
    }

    /// Subscribe to pairing responses (waiters fire regardless).
    pub fn on_response<F, Fut>(&self, handler: F)
    where
        F: Fn(PairingResponse) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.responses.register(handler);
    }

    pub(crate) fn handle_request(&self, from: &PublicKey, content: &Content) {
        let request = match AccountPairingRequestContent::from_content(content) {
            Ok(request) => request,
            Err(error) => {
                tracing::debug!(from = %from.address(), %error, "malformed pairing request dropped");
                return;
            }
        };

        self.inner.requests.dispatch(&IncomingPairingRequest {
            core: Arc::clone(&self.inner.core),
            from: *from,
            request_id: content.id().to_vec(),
            address: request.address,
            roles: request.roles,
            expires: request.expires,
            responded: Arc::new(AtomicBool::new(false)),
        });
    }

    pub(crate) fn handle_response(&self, from: &PublicKey, content: &Content) {
        let response = match AccountPairingResponseContent::from_content(content) {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!(from = %from.address(), %error, "malformed pairing response dropped");
                return;
            }
        };

        let delivered = PairingResponse {
            from: *from,
            status: response.status,
            operation: response.operation,
            assets: response.assets,
        };

        let request_id = hex::encode(&response.response_to);
        if let Some(tx) = self.inner.core.waiters.complete(&request_id) {
            let _ = tx.send(ResponseEvent::Pairing(delivered.clone()));
        } else {
            tracing::debug!(%request_id, "pairing response without waiter");
        }

        self.inner.responses.dispatch(&delivered);
    }
}
