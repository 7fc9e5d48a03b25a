//! Request/response correlation engine.
//!
//! A per-client table maps the hex-encoded 32-byte request id to a
//! single-slot waiter. The dispatcher completes waiters when a response
//! envelope names the id in its `response_to` field; every exit path
//! (delivery, deadline, cancellation, failed send, client close) removes
//! the table entry, so late or duplicate responses find nothing and are
//! dropped.

use crate::credentials::CredentialResponse;
use crate::discovery::DiscoveredPeer;
use crate::pairing::PairingResponse;
use parking_lot::Mutex;
use self_core::{Result, SelfError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Default timeout for every "request and wait" operation.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// A correlated response, typed by the flow that produced it.
#[derive(Debug)]
pub(crate) enum ResponseEvent {
    /// A peer answered a discovery request
    Discovery(DiscoveredPeer),
    /// A peer answered a credential exchange request
    Credential(CredentialResponse),
    /// A peer answered a pairing request
    Pairing(PairingResponse),
}

/// The per-client waiter table.
#[derive(Clone, Default, Debug)]
pub(crate) struct ResponseWaiters {
    inner: Arc<Mutex<HashMap<String, oneshot::Sender<ResponseEvent>>>>,
}

impl ResponseWaiters {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `request_id`, returning its receiving side.
    ///
    /// At most one waiter per id; a duplicate registration replaces (and
    /// thereby cancels) the previous waiter.
    pub(crate) fn register(&self, request_id: String) -> oneshot::Receiver<ResponseEvent> {
        let (tx, rx) = oneshot::channel();
        self.inner.lock().insert(request_id, tx);
        rx
    }

    /// Atomically remove and return the waiter for `request_id`.
    pub(crate) fn complete(&self, request_id: &str) -> Option<oneshot::Sender<ResponseEvent>> {
        self.inner.lock().remove(request_id)
    }

    /// Remove the waiter for `request_id`, dropping its sender.
    pub(crate) fn remove(&self, request_id: &str) -> bool {
        self.inner.lock().remove(request_id).is_some()
    }

    /// Whether a waiter exists for `request_id`.
    #[cfg(test)]
    pub(crate) fn contains(&self, request_id: &str) -> bool {
        self.inner.lock().contains_key(request_id)
    }

    /// Number of registered waiters.
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Drop every waiter; each pending wait resolves to `Cancelled`.
    pub(crate) fn clear(&self) {
        self.inner.lock().clear();
    }
}

/// The waiting side of one correlated request.
///
/// Wrapped by the public per-flow handles; consuming `wait` guarantees
/// the table entry is gone whichever way the wait ends.
#[derive(Debug)]
pub(crate) struct Waiter {
    request_id: String,
    receiver: oneshot::Receiver<ResponseEvent>,
    waiters: ResponseWaiters,
}

impl Waiter {
    pub(crate) fn new(
        request_id: String,
        receiver: oneshot::Receiver<ResponseEvent>,
        waiters: ResponseWaiters,
    ) -> Self {
        Self {
            request_id,
            receiver,
            waiters,
        }
    }

    /// The hex-encoded request id this waiter is registered under.
    pub(crate) fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Block until the response arrives, the timeout elapses or the
    /// sender side disappears (cancellation or client close).
    pub(crate) async fn wait(mut self, timeout: Duration) -> Result<ResponseEvent> {
        match tokio::time::timeout(timeout, &mut self.receiver).await {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(_closed)) => {
                self.waiters.remove(&self.request_id);
                Err(SelfError::Cancelled)
            }
            Err(_elapsed) => {
                self.waiters.remove(&self.request_id);
                Err(SelfError::Deadline)
            }
        }
    }

    /// Withdraw the waiter; a late response will be dropped.
    pub(crate) fn cancel(&self) {
        self.waiters.remove(&self.request_id);
    }
}
