//! Credential exchange subsystem.
//!
//! Four correlated flows share one structure: build request, register a
//! waiter under the envelope id, send, await the response. Incoming
//! requests surface with a one-shot responder enforcing the right flow;
//! incoming responses complete the waiter and fan out to subscribers.

use crate::client::CoreState;
use crate::correlation::{ResponseEvent, Waiter, DEFAULT_REQUEST_TIMEOUT};
use crate::handlers::HandlerSet;
use self_account::Object;
use self_core::{PublicKey, Result, SelfError, Timestamp};
use self_credentials::{
    CredentialBuilder, PresentationBuilder, VerifiableCredential, VerifiablePresentation,
    PRESENTATION_TYPE_BASE,
};
use self_message::{
    Content, CredentialPresentationRequestContent, CredentialPresentationResponseContent,
    CredentialVerificationRequestContent, CredentialVerificationResponseContent, Evidence,
    MessageContent, PresentationDetail, ResponseStatus,
};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Envelope type list carried by presentation requests.
pub const PRESENTATION_REQUEST_TYPES: &[&str] = &[PRESENTATION_TYPE_BASE, "CustomPresentation"];

/// A named, uploaded object usable as evidence.
#[derive(Debug, Clone)]
pub struct Asset {
    /// Display name
    pub name: String,
    /// The underlying stored object
    pub object: Object,
}

impl Asset {
    /// The object id.
    pub fn id(&self) -> &[u8] {
        self.object.id()
    }

    /// The plaintext content hash.
    pub fn hash(&self) -> &[u8] {
        self.object.hash()
    }

    /// The mime type.
    pub fn mime(&self) -> &str {
        self.object.mime()
    }

    /// The plaintext data, when present.
    pub fn data(&self) -> Option<&[u8]> {
        self.object.data()
    }

    /// Wrap as evidence of `evidence_type`.
    pub fn to_evidence(&self, evidence_type: impl Into<String>) -> Evidence {
        Evidence {
            evidence_type: evidence_type.into(),
            object: self.object.to_ref(),
        }
    }
}

/// A correlated credential exchange response.
#[derive(Debug, Clone)]
pub struct CredentialResponse {
    /// The responding peer's address
    pub from: PublicKey,
    /// Outcome status
    pub status: ResponseStatus,
    /// Presentations (presentation flow only; otherwise empty)
    pub presentations: Vec<VerifiablePresentation>,
    /// Credentials (verification flow only; otherwise empty)
    pub credentials: Vec<VerifiableCredential>,
}

/// An incoming presentation or verification request.
///
/// The handler may call exactly one of
/// [`respond_with_presentations`](Self::respond_with_presentations)
/// (presentation flow), [`respond_with_credentials`](Self::respond_with_credentials)
/// (verification flow) or [`reject`](Self::reject).
#[derive(Clone)]
pub struct IncomingCredentialRequest {
    core: Arc<CoreState>,
    from: PublicKey,
    request_id: Vec<u8>,
    is_verification: bool,
    type_list: Vec<String>,
    details: Vec<PresentationDetail>,
    evidence: Vec<Evidence>,
    proof: Vec<VerifiablePresentation>,
    expires: i64,
    responded: Arc<AtomicBool>,
}

impl IncomingCredentialRequest {
    /// Whether this is a verification (vs presentation) request.
    pub fn is_verification(&self) -> bool {
        self.is_verification
    }

    /// The requesting peer's address.
    pub fn from(&self) -> &PublicKey {
        &self.from
    }

    /// The hex-encoded request id.
    pub fn request_id(&self) -> String {
        hex::encode(&self.request_id)
    }

    /// The envelope type list.
    pub fn type_list(&self) -> &[String] {
        &self.type_list
    }

    /// Requested credential shapes (presentation flow; otherwise empty).
    pub fn details(&self) -> &[PresentationDetail] {
        &self.details
    }

    /// Attached evidence (verification flow; otherwise empty).
    pub fn evidence(&self) -> &[Evidence] {
        &self.evidence
    }

    /// Presentations proving the requester's standing.
    pub fn proof(&self) -> &[VerifiablePresentation] {
        &self.proof
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

    /// Accept a presentation request with presentations.
    pub async fn respond_with_presentations(
        &self,
        presentations: Vec<VerifiablePresentation>,
    ) -> Result<()> {
        if self.is_verification {
            return Err(SelfError::invalid_response(
                "presentation response to a verification request",
            ));
        }
        self.claim_responded()?;

        let response = CredentialPresentationResponseContent {
            response_to: self.request_id.clone(),
            status: ResponseStatus::Accepted,
            presentations,
        };
        self.core.send(&self.from, &response.into_content()?).await
    }

    /// Accept a verification request with credentials.
    pub async fn respond_with_credentials(
        &self,
        credentials: Vec<VerifiableCredential>,
    ) -> Result<()> {
        if !self.is_verification {
            return Err(SelfError::invalid_response(
                "credential response to a presentation request",
            ));
        }
        self.claim_responded()?;

        let response = CredentialVerificationResponseContent {
            response_to: self.request_id.clone(),
            status: ResponseStatus::Accepted,
            credentials,
        };
        self.core.send(&self.from, &response.into_content()?).await
    }

    /// Reject the request.
    pub async fn reject(&self) -> Result<()> {
        self.claim_responded()?;

        let content = if self.is_verification {
            CredentialVerificationResponseContent {
                response_to: self.request_id.clone(),
                status: ResponseStatus::Forbidden,
                credentials: Vec::new(),
            }
            .into_content()?
        } else {
            CredentialPresentationResponseContent {
                response_to: self.request_id.clone(),
                status: ResponseStatus::Forbidden,
                presentations: Vec::new(),
            }
            .into_content()?
        };

        self.core.send(&self.from, &content).await
    }
}

impl std::fmt::Debug for IncomingCredentialRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncomingCredentialRequest")
            .field("from", &self.from.address())
            .field("request_id", &self.request_id())
            .field("is_verification", &self.is_verification)
            .finish_non_exhaustive()
    }
}

/// Handle to an in-flight credential exchange request.
#[derive(Debug)]
pub struct CredentialRequestHandle {
    waiter: Waiter,
}

impl CredentialRequestHandle {
    /// The hex-encoded request id.
    pub fn request_id(&self) -> &str {
        self.waiter.request_id()
    }

    /// Wait for the peer's response.
    pub async fn wait_for_response(self, timeout: Duration) -> Result<CredentialResponse> {
        match self.waiter.wait(timeout).await? {
            ResponseEvent::Credential(response) => Ok(response),
            _ => Err(SelfError::invalid_response(
                "credential request answered by a different flow",
            )),
        }
    }

    /// Withdraw the waiter; a late response will be dropped.
    pub fn cancel(&self) {
        self.waiter.cancel();
    }
}

struct CredentialsInner {
    core: Arc<CoreState>,
    presentation_requests: HandlerSet<IncomingCredentialRequest>,
    verification_requests: HandlerSet<IncomingCredentialRequest>,
    presentation_responses: HandlerSet<CredentialResponse>,
    verification_responses: HandlerSet<CredentialResponse>,
}

/// The credential exchange subsystem handle.
#[derive(Clone)]
pub struct Credentials {
    inner: Arc<CredentialsInner>,
}

impl Credentials {
    pub(crate) fn new(core: Arc<CoreState>) -> Self {
        Self {
            inner: Arc::new(CredentialsInner {
                core,
                presentation_requests: HandlerSet::new(),
                verification_requests: HandlerSet::new(),
                presentation_responses: HandlerSet::new(),
                verification_responses: HandlerSet::new(),
            }),
        }
    }

    fn expires(timeout: Duration) -> i64 {
        self_core::to_unix(self_core::now()) + timeout.as_secs() as i64
    }

    async fn send_request(
        &self,
        peer_did: &str,
        content: Content,
    ) -> Result<CredentialRequestHandle> {
        let core = &self.inner.core;
        core.ensure_open()?;
        let peer = CoreState::parse_peer(peer_did)?;

        let request_id = content.request_id();
        let receiver = core.waiters.register(request_id.clone());
        let waiter = Waiter::new(request_id, receiver, core.waiters.clone());

        core.send_correlated(&peer, &content).await?;
        Ok(CredentialRequestHandle { waiter })
    }

    /// Request a presentation matching `details`, default timeout.
    pub async fn request_presentation(
        &self,
        peer_did: &str,
        details: Vec<PresentationDetail>,
    ) -> Result<CredentialRequestHandle> {
        self.request_presentation_with_evidence(
            peer_did,
            details,
            Vec::new(),
            Vec::new(),
            DEFAULT_REQUEST_TIMEOUT,
        )
        .await
    }

    /// Request a presentation with evidence, proof presentations and an
    /// explicit timeout.
    ///
    /// Presentation request envelopes carry no evidence slot on the wire;
    /// the parameter is accepted for interface symmetry and ignored.
    /// Proof presentations are the supported attachment.
    pub async fn request_presentation_with_evidence(
        &self,
        peer_did: &str,
        details: Vec<PresentationDetail>,
        evidence: Vec<Evidence>,
        proof: Vec<VerifiablePresentation>,
        timeout: Duration,
    ) -> Result<CredentialRequestHandle> {
        if !evidence.is_empty() {
            tracing::debug!(
                items = evidence.len(),
                "presentation requests carry no evidence; ignoring"
            );
        }

        let content = CredentialPresentationRequestContent {
            presentation_type: PRESENTATION_REQUEST_TYPES
                .iter()
                .map(|t| (*t).to_string())
                .collect(),
            details,
            proof,
            expires: Self::expires(timeout),
        }
        .into_content()?;

        self.send_request(peer_did, content).await
    }

    /// Request verification of credentials of the given types, default
    /// timeout.
    pub async fn request_verification(
        &self,
        peer_did: &str,
        credential_type: Vec<String>,
    ) -> Result<CredentialRequestHandle> {
        self.request_verification_with_evidence(
            peer_did,
            credential_type,
            Vec::new(),
            Vec::new(),
            DEFAULT_REQUEST_TIMEOUT,
        )
        .await
    }

    /// Request verification with evidence objects, proof presentations
    /// and an explicit timeout.
    pub async fn request_verification_with_evidence(
        &self,
        peer_did: &str,
        credential_type: Vec<String>,
        evidence: Vec<Evidence>,
        proof: Vec<VerifiablePresentation>,
        timeout: Duration,
    ) -> Result<CredentialRequestHandle> {
        let content = CredentialVerificationRequestContent {
            credential_type,
            evidence,
            proof,
            expires: Self::expires(timeout),
        }
        .into_content()?;

        self.send_request(peer_did, content).await
    }

    /// Subscribe to incoming presentation requests.
    pub fn on_presentation_request<F, Fut>(&self, handler: F)
    where
        F: Fn(IncomingCredentialRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.presentation_requests.register(handler);
    }

    /// Subscribe to incoming verification requests.
    pub fn on_verification_request<F, Fut>(&self, handler: F)
    where
        F: Fn(IncomingCredentialRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.verification_requests.register(handler);
    }

    /// Subscribe to presentation responses (waiters fire regardless).
    pub fn on_presentation_response<F, Fut>(&self, handler: F)
    where
        F: Fn(CredentialResponse) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.presentation_responses.register(handler);
    }

    /// Subscribe to verification responses (waiters fire regardless).
    pub fn on_verification_response<F, Fut>(&self, handler: F)
    where
        F: Fn(CredentialResponse) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.verification_responses.register(handler);
    }

    /// Issue a credential built with `builder` through the account
    /// primitive.
    pub async fn issue_credential(
        &self,
        builder: CredentialBuilder,
    ) -> Result<VerifiableCredential> {
        self.inner.core.ensure_open()?;
        let unsigned = builder.finish()?;
        self.inner.core.account.credential_issue(&unsigned).await
    }

    /// Build and sign a presentation holding `credentials`, with the
    /// inbox address as holder.
    pub async fn create_presentation(
        &self,
        types: Vec<String>,
        credentials: Vec<VerifiableCredential>,
    ) -> Result<VerifiablePresentation> {
        let core = &self.inner.core;
        core.ensure_open()?;

        let unsigned = PresentationBuilder::new()
            .presentation_type(types)
            .holder(core.inbox)
            .credentials(credentials)
            .sign_with(core.inbox)
            .finish()?;

        core.account.presentation_issue(&unsigned).await
    }

    /// Create an asset from plaintext and upload it encrypted.
    pub async fn create_asset(
        &self,
        name: impl Into<String>,
        mime: impl Into<String>,
        data: Vec<u8>,
    ) -> Result<Asset> {
        let core = &self.inner.core;
        core.ensure_open()?;

        let mut object = Object::from_data(mime, data);
        core.account.object_upload(&mut object, false).await?;

        Ok(Asset {
            name: name.into(),
            object,
        })
    }

    /// Download an asset's data into its object.
    pub async fn download_asset(&self, asset: &mut Asset) -> Result<()> {
        let core = &self.inner.core;
        core.ensure_open()?;
        core.account.object_download(&mut asset.object).await
    }

    pub(crate) fn handle_presentation_request(&self, from: &PublicKey, content: &Content) {
        let request = match CredentialPresentationRequestContent::from_content(content) {
            Ok(request) => request,
            Err(error) => {
                tracing::debug!(from = %from.address(), %error, "malformed presentation request dropped");
                return;
            }
        };

        self.inner
            .presentation_requests
            .dispatch(&IncomingCredentialRequest {
                core: Arc::clone(&self.inner.core),
                from: *from,
                request_id: content.id().to_vec(),
                is_verification: false,
                type_list: request.presentation_type,
                details: request.details,
                evidence: Vec::new(),
                proof: request.proof,
                expires: request.expires,
                responded: Arc::new(AtomicBool::new(false)),
            });
    }

    pub(crate) fn handle_verification_request(&self, from: &PublicKey, content: &Content) {
        let request = match CredentialVerificationRequestContent::from_content(content) {
            Ok(request) => request,
            Err(error) => {
                tracing::debug!(from = %from.address(), %error, "malformed verification request dropped");
                return;
            }
        };

        self.inner
            .verification_requests
            .dispatch(&IncomingCredentialRequest {
                core: Arc::clone(&self.inner.core),
                from: *from,
                request_id: content.id().to_vec(),
                is_verification: true,
                type_list: request.credential_type,
                details: Vec::new(),
                evidence: request.evidence,
                proof: request.proof,
                expires: request.expires,
                responded: Arc::new(AtomicBool::new(false)),
            });
    }

    pub(crate) fn handle_presentation_response(&self, from: &PublicKey, content: &Content) {
        let response = match CredentialPresentationResponseContent::from_content(content) {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!(from = %from.address(), %error, "malformed presentation response dropped");
                return;
            }
        };

        let delivered = CredentialResponse {
            from: *from,
            status: response.status,
            presentations: response.presentations,
            credentials: Vec::new(),
        };

        self.complete(&response.response_to, delivered.clone());
        self.inner.presentation_responses.dispatch(&delivered);
    }

    pub(crate) fn handle_verification_response(&self, from: &PublicKey, content: &Content) {
        let response = match CredentialVerificationResponseContent::from_content(content) {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!(from = %from.address(), %error, "malformed verification response dropped");
                return;
            }
        };

        let delivered = CredentialResponse {
            from: *from,
            status: response.status,
            presentations: Vec::new(),
            credentials: response.credentials,
        };

        self.complete(&response.response_to, delivered.clone());
        self.inner.verification_responses.dispatch(&delivered);
    }

    fn complete(&self, response_to: &[u8], response: CredentialResponse) {
        let request_id = hex::encode(response_to);
        if let Some(tx) = self.inner.core.waiters.complete(&request_id) {
            let _ = tx.send(ResponseEvent::Credential(response));
        } else {
            tracing::debug!(%request_id, "credential response without waiter");
        }
    }
}
