//! Test doubles for the node API and the credential lookup.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::sleep;

use crate::errors::{LookupError, NodeError};
use crate::node_client::NodeApi;
use crate::payload::SignedAssignment;
use crate::subgraph::{CredentialLookup, CredentialRecord};
use crate::types::{
    AssignmentResult, Confirmation, CredentialId, NodeIdentity, NodeUrl, RejectionReason,
};

/// A call recorded by [`MockNode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeCall {
    FetchNodeInfo(String),
    Submit(String),
    CheckStatus(String),
}

/// In-memory node.
///
/// Scripted results are consumed first. Once a script is empty the node
/// behaves like a real one: it accepts a credential once and rejects later
/// submissions of it as already assigned.
pub struct MockNode {
    identity: Mutex<NodeIdentity>,
    handshake_script: Mutex<VecDeque<Result<NodeIdentity, NodeError>>>,
    submit_script: Mutex<VecDeque<AssignmentResult>>,
    status_script: Mutex<VecDeque<AssignmentResult>>,
    unreachable: AtomicBool,
    status_supported: bool,
    latency: Duration,
    assigned: Mutex<HashSet<String>>,
    calls: Mutex<Vec<NodeCall>>,
    submissions: Mutex<Vec<SignedAssignment>>,
}

impl MockNode {
    pub fn new() -> Self {
        Self {
            identity: Mutex::new(NodeIdentity {
                node_id: "node.example:8080".to_string(),
                nonce: None,
                network: Some("mainnet".to_string()),
            }),
            handshake_script: Mutex::new(VecDeque::new()),
            submit_script: Mutex::new(VecDeque::new()),
            status_script: Mutex::new(VecDeque::new()),
            unreachable: AtomicBool::new(false),
            status_supported: true,
            latency: Duration::ZERO,
            assigned: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
        }
    }

    pub fn with_identity(self, identity: NodeIdentity) -> Self {
        *self.identity.lock() = identity;
        self
    }

    pub fn with_status_endpoint(mut self, supported: bool) -> Self {
        self.status_supported = supported;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail every handshake with `Unreachable`.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::Relaxed);
    }

    pub fn push_handshake(&self, result: Result<NodeIdentity, NodeError>) {
        self.handshake_script.lock().push_back(result);
    }

    pub fn push_submit(&self, result: AssignmentResult) {
        self.submit_script.lock().push_back(result);
    }

    pub fn push_status(&self, result: AssignmentResult) {
        self.status_script.lock().push_back(result);
    }

    /// Mark a credential as already assigned on this node.
    pub fn mark_assigned(&self, credential: &str) {
        self.assigned.lock().insert(credential.to_string());
    }

    pub fn calls(&self) -> Vec<NodeCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn submit_count(&self) -> usize {
        self.submissions.lock().len()
    }

    pub fn submissions(&self) -> Vec<SignedAssignment> {
        self.submissions.lock().clone()
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }
    }
}

impl Default for MockNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeApi for MockNode {
    async fn fetch_node_info(&self, node: &NodeUrl) -> Result<NodeIdentity, NodeError> {
        self.calls.lock().push(NodeCall::FetchNodeInfo(node.to_string()));
        self.delay().await;

        if let Some(result) = self.handshake_script.lock().pop_front() {
            return result;
        }
        if self.unreachable.load(Ordering::Relaxed) {
            return Err(NodeError::Unreachable(format!("connection refused: {node}")));
        }
        Ok(self.identity.lock().clone())
    }

    async fn submit_assignment(
        &self,
        node: &NodeUrl,
        signed: &SignedAssignment,
    ) -> AssignmentResult {
        self.calls.lock().push(NodeCall::Submit(node.to_string()));
        self.submissions.lock().push(signed.clone());
        self.delay().await;

        let credential = signed.payload().credential.to_string();
        if let Some(result) = self.submit_script.lock().pop_front() {
            if matches!(result, AssignmentResult::Accepted(_)) {
                self.assigned.lock().insert(credential);
            }
            return result;
        }

        if !self.assigned.lock().insert(credential) {
            return AssignmentResult::Rejected(RejectionReason {
                status: Some(403),
                reason: "already assigned".to_string(),
            });
        }
        AssignmentResult::Accepted(Confirmation {
            reference: signed.digest_hex(),
            pending: false,
        })
    }

    async fn check_status(&self, node: &NodeUrl, reference: &str) -> AssignmentResult {
        self.calls
            .lock()
            .push(NodeCall::CheckStatus(format!("{node}#{reference}")));
        self.delay().await;

        self.status_script.lock().pop_front().unwrap_or_else(|| {
            AssignmentResult::Accepted(Confirmation {
                reference: reference.to_string(),
                pending: false,
            })
        })
    }

    fn supports_status(&self) -> bool {
        self.status_supported
    }
}

/// Lookup that answers from a fixed record.
pub struct StaticLookup {
    record: Option<CredentialRecord>,
    failure: Option<LookupError>,
    lookups: Mutex<Vec<String>>,
}

impl StaticLookup {
    pub fn found(record: CredentialRecord) -> Self {
        Self {
            record: Some(record),
            failure: None,
            lookups: Mutex::new(Vec::new()),
        }
    }

    pub fn not_found() -> Self {
        Self {
            record: None,
            failure: None,
            lookups: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: LookupError) -> Self {
        Self {
            record: None,
            failure: Some(error),
            lookups: Mutex::new(Vec::new()),
        }
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().clone()
    }
}

#[async_trait]
impl CredentialLookup for StaticLookup {
    async fn lookup(
        &self,
        credential: &CredentialId,
    ) -> Result<Option<CredentialRecord>, LookupError> {
        self.lookups.lock().push(credential.to_string());
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(self.record.clone()),
        }
    }
}
