//! Hypercycle Manager Mode assignment core.
//!
//! Builds a network-aware assignment payload for a License/ANFE, signs it
//! with the owner's (or delegate's) key, submits it to a node's Manager Mode
//! API and confirms the outcome. Every flow is stateless and owns its key
//! only for the duration of the call.

#![forbid(unsafe_code)]

pub mod errors;
pub mod network;
pub mod node_client;
pub mod orchestrator;
pub mod payload;
pub mod retry;
pub mod schema;
pub mod subgraph;
pub mod testing;
pub mod types;

#[cfg(test)]
mod proptests;

pub use errors::{AssignError, FailureKind, InputError, LookupError, NodeError};
pub use network::{Network, NetworkParams, SubgraphEndpoint};
pub use node_client::{HttpNodeClient, NodeApi, NodeClientConfig};
pub use orchestrator::{
    AssignmentOptions, AssignmentOrchestrator, AssignmentOutcome, AssignmentReport,
    AssignmentRequest, AssignmentState,
};
pub use payload::{AssignmentPayload, PayloadBuilder, SignedAssignment, PAYLOAD_FORMAT};
pub use retry::{PollPolicy, RetryPolicy};
pub use schema::NodeApiSchema;
pub use subgraph::{
    CredentialKind, CredentialLookup, CredentialRecord, ShareProposal, SubgraphClient,
};
pub use types::{
    check_reference, AssignmentResult, Confirmation, CredentialId, Freshness, FreshnessSource,
    NodeIdentity, NodeUrl, RejectionReason,
};
