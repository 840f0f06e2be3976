//! End-to-end assignment flow.
//!
//! ```text
//! Init -> PayloadReady -> Signed -> Submitted -> Confirmed
//!                                            \-> Rejected
//! any state -> Failed
//! ```
//!
//! Inputs and the key are validated before any network call. The signed
//! assignment is built once and every retry resends that exact value.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use hcn_crypto::{Account, KeySigner};
use serde::Serialize;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::errors::{AssignError, NodeError};
use crate::network::Network;
use crate::node_client::NodeApi;
use crate::payload::{PayloadBuilder, SignedAssignment};
use crate::retry::{PollPolicy, RetryPolicy};
use crate::subgraph::{CredentialLookup, CredentialRecord};
use crate::types::{
    check_reference, AssignmentResult, Confirmation, CredentialId, Freshness, NodeIdentity,
    NodeUrl, RejectionReason,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentState {
    Init,
    PayloadReady,
    Signed,
    Submitted,
    Confirmed,
    Rejected,
    Failed,
}

impl AssignmentState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AssignmentState::Confirmed | AssignmentState::Rejected | AssignmentState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentState::Init => "init",
            AssignmentState::PayloadReady => "payload_ready",
            AssignmentState::Signed => "signed",
            AssignmentState::Submitted => "submitted",
            AssignmentState::Confirmed => "confirmed",
            AssignmentState::Rejected => "rejected",
            AssignmentState::Failed => "failed",
        }
    }
}

impl fmt::Display for AssignmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentOutcome {
    Confirmed(Confirmation),
    Rejected(RejectionReason),
    Failed(AssignError),
}

impl AssignmentOutcome {
    pub fn state(&self) -> AssignmentState {
        match self {
            AssignmentOutcome::Confirmed(_) => AssignmentState::Confirmed,
            AssignmentOutcome::Rejected(_) => AssignmentState::Rejected,
            AssignmentOutcome::Failed(_) => AssignmentState::Failed,
        }
    }
}

/// Raw caller inputs for one flow.
pub struct AssignmentRequest {
    pub credential: String,
    pub node_url: String,
    pub private_key: Zeroizing<String>,
    pub network: Network,
}

impl fmt::Debug for AssignmentRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssignmentRequest")
            .field("credential", &self.credential)
            .field("node_url", &self.node_url)
            .field("private_key", &"<redacted>")
            .field("network", &self.network)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AssignmentOptions {
    pub retry: RetryPolicy,
    /// `None` skips status polling.
    pub poll: Option<PollPolicy>,
    pub handshake_attempts: u32,
    pub handshake_retry_delay: Duration,
    pub check_ownership: bool,
}

impl Default for AssignmentOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            poll: Some(PollPolicy::default()),
            handshake_attempts: 2,
            handshake_retry_delay: Duration::from_secs(1),
            check_ownership: true,
        }
    }
}

/// Terminal summary of a flow.
#[derive(Debug, Clone)]
pub struct AssignmentReport {
    pub credential: String,
    pub node_url: String,
    pub network: Network,
    pub signer: Option<Account>,
    pub node_id: Option<String>,
    pub record: Option<CredentialRecord>,
    pub outcome: AssignmentOutcome,
    /// Number of submissions sent.
    pub attempts: u32,
    /// States visited, in order, ending with the terminal state.
    pub states: Vec<AssignmentState>,
}

impl AssignmentReport {
    pub fn state(&self) -> AssignmentState {
        self.outcome.state()
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self.outcome, AssignmentOutcome::Confirmed(_))
    }
}

pub struct AssignmentOrchestrator {
    node: Arc<dyn NodeApi>,
    lookup: Option<Arc<dyn CredentialLookup>>,
    options: AssignmentOptions,
}

/// Mutable progress of a single run.
struct Progress {
    states: Vec<AssignmentState>,
    attempts: u32,
    signer: Option<Account>,
    node_id: Option<String>,
    record: Option<CredentialRecord>,
}

impl Progress {
    fn enter(&mut self, state: AssignmentState) {
        debug!(%state, "assignment state");
        self.states.push(state);
    }
}

impl AssignmentOrchestrator {
    pub fn new(node: Arc<dyn NodeApi>, options: AssignmentOptions) -> Self {
        Self {
            node,
            lookup: None,
            options,
        }
    }

    pub fn with_lookup(mut self, lookup: Arc<dyn CredentialLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn options(&self) -> &AssignmentOptions {
        &self.options
    }

    pub async fn run(&self, request: AssignmentRequest) -> AssignmentReport {
        let mut progress = Progress {
            states: vec![AssignmentState::Init],
            attempts: 0,
            signer: None,
            node_id: None,
            record: None,
        };

        let outcome = match self.execute(&request, &mut progress).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(kind = %err.kind(), error = %err, "assignment failed");
                AssignmentOutcome::Failed(err)
            }
        };
        progress.enter(outcome.state());
        info!(
            credential = %request.credential,
            state = %outcome.state(),
            attempts = progress.attempts,
            "assignment finished"
        );

        AssignmentReport {
            credential: request.credential,
            node_url: request.node_url,
            network: request.network,
            signer: progress.signer,
            node_id: progress.node_id,
            record: progress.record,
            outcome,
            attempts: progress.attempts,
            states: progress.states,
        }
    }

    async fn execute(
        &self,
        request: &AssignmentRequest,
        progress: &mut Progress,
    ) -> Result<AssignmentOutcome, AssignError> {
        let credential: CredentialId = request.credential.parse()?;
        let node_url: NodeUrl = request.node_url.parse()?;
        let signer = KeySigner::load(&request.private_key)?;
        progress.signer = Some(signer.account());
        let params = request.network.params();

        info!(
            credential = %credential,
            node = %node_url,
            network = %request.network,
            signer = %signer.account(),
            "starting assignment"
        );

        if self.options.check_ownership {
            if let Some(lookup) = &self.lookup {
                let record = lookup
                    .lookup(&credential)
                    .await?
                    .ok_or_else(|| AssignError::CredentialNotFound(credential.to_string()))?;
                record.authorize(&credential, &signer.account())?;
                if !record.has_required_backing {
                    warn!(
                        credential = %credential,
                        chain = %record.chain,
                        "credential lacks required backing"
                    );
                }
                progress.record = Some(record);
            }
        }

        let node = self.handshake(&node_url).await?;
        progress.node_id = Some(node.node_id.clone());
        params
            .check_node_network(node.network.as_deref())
            .map_err(AssignError::NetworkMismatch)?;

        let freshness = Freshness::for_node(&node)?;
        let payload = PayloadBuilder::new(signer.account()).build(
            &credential,
            &node,
            request.network,
            freshness,
        )?;
        progress.enter(AssignmentState::PayloadReady);

        let signed = SignedAssignment::sign(payload, &signer)?;
        drop(signer);
        progress.enter(AssignmentState::Signed);

        let result = self.submit(&node_url, &signed, progress).await?;
        match result {
            AssignmentResult::Rejected(reason) => {
                info!(reason = %reason, "assignment rejected");
                Ok(AssignmentOutcome::Rejected(reason))
            }
            AssignmentResult::Accepted(confirmation) => {
                self.confirm(&node_url, confirmation, &signed.digest_hex()).await
            }
            AssignmentResult::TransportFailure { detail, .. } => {
                Err(AssignError::InvalidResponse(detail))
            }
        }
    }

    async fn handshake(&self, node_url: &NodeUrl) -> Result<NodeIdentity, AssignError> {
        let attempts = self.options.handshake_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.node.fetch_node_info(node_url).await {
                Ok(node) => return Ok(node),
                Err(NodeError::Unreachable(detail)) if attempt < attempts => {
                    warn!(attempt, %detail, "node handshake failed, retrying");
                    tokio::time::sleep(self.options.handshake_retry_delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Submit with bounded backoff. Returns the first non-retryable result.
    async fn submit(
        &self,
        node_url: &NodeUrl,
        signed: &SignedAssignment,
        progress: &mut Progress,
    ) -> Result<AssignmentResult, AssignError> {
        let policy = self.options.retry;
        loop {
            progress.attempts += 1;
            let attempt = progress.attempts;
            let result = self.node.submit_assignment(node_url, signed).await;
            if attempt == 1 {
                progress.enter(AssignmentState::Submitted);
            }

            match result {
                AssignmentResult::TransportFailure {
                    retryable: true,
                    detail,
                } => {
                    if !policy.should_retry(attempt) {
                        return Err(AssignError::Transport {
                            attempts: attempt,
                            detail,
                        });
                    }
                    let delay = policy.delay_after(attempt);
                    warn!(attempt, ?delay, %detail, "submission failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                other => return Ok(other),
            }
        }
    }

    /// Settle an accepted submission. `digest` is the local fallback
    /// reference; the node never issued it, so it is never polled.
    async fn confirm(
        &self,
        node_url: &NodeUrl,
        confirmation: Confirmation,
        digest: &str,
    ) -> Result<AssignmentOutcome, AssignError> {
        let pollable = confirmation.reference != digest
            && match check_reference(&confirmation.reference) {
                Ok(()) => true,
                Err(detail) => {
                    warn!(%detail, "node reference cannot be polled");
                    false
                }
            };
        let poll = match self.options.poll {
            Some(policy) if confirmation.pending && pollable && self.node.supports_status() => {
                policy
            }
            _ => {
                info!(
                    reference = %confirmation.reference,
                    pending = confirmation.pending,
                    "assignment accepted"
                );
                return Ok(AssignmentOutcome::Confirmed(confirmation));
            }
        };

        info!(reference = %confirmation.reference, "assignment pending, polling status");
        match self
            .node
            .poll_status(node_url, &confirmation.reference, poll)
            .await
        {
            AssignmentResult::Accepted(settled) => Ok(AssignmentOutcome::Confirmed(settled)),
            AssignmentResult::Rejected(reason) => Ok(AssignmentOutcome::Rejected(reason)),
            AssignmentResult::TransportFailure {
                retryable: true, ..
            } => Err(AssignError::ConfirmationPending {
                reference: confirmation.reference,
            }),
            AssignmentResult::TransportFailure { detail, .. } => {
                Err(AssignError::InvalidResponse(detail))
            }
        }
    }
}
