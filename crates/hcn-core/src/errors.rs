//! Error types for the assignment flow.
//!
//! Each stage has its own error enum. `AssignError` is the terminal failure
//! the orchestrator reports, and `FailureKind` is its flat classification used
//! for exit codes and JSON output.

use std::fmt;

use hcn_crypto::SignerError;
use serde::Serialize;
use thiserror::Error;

/// Malformed caller input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("invalid credential id: {0}")]
    Credential(String),

    #[error("invalid node URL: {0}")]
    NodeUrl(String),

    #[error("cannot produce freshness value: {0}")]
    Freshness(String),
}

/// Handshake failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Connection refused, DNS failure, timeout, or a 5xx on the handshake.
    #[error("node unreachable: {0}")]
    Unreachable(String),

    /// The node answered but not in the expected protocol.
    #[error("invalid node response: {0}")]
    InvalidResponse(String),
}

/// Credential ownership lookup failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("credential {0} not found on any indexed chain")]
    NotFound(String),

    #[error("{signer} is neither owner ({owner}) nor delegated signer of credential {credential}")]
    Unauthorized {
        credential: String,
        signer: String,
        owner: String,
    },

    #[error("subgraph query failed: {0}")]
    Query(String),
}

/// Flat classification of terminal failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidInput,
    InvalidKey,
    Unreachable,
    InvalidResponse,
    NetworkMismatch,
    Unauthorized,
    CredentialNotFound,
    LookupUnavailable,
    Transport,
    ConfirmationPending,
}

impl FailureKind {
    pub fn name(&self) -> &'static str {
        match self {
            FailureKind::InvalidInput => "invalid_input",
            FailureKind::InvalidKey => "invalid_key",
            FailureKind::Unreachable => "unreachable",
            FailureKind::InvalidResponse => "invalid_response",
            FailureKind::NetworkMismatch => "network_mismatch",
            FailureKind::Unauthorized => "unauthorized",
            FailureKind::CredentialNotFound => "credential_not_found",
            FailureKind::LookupUnavailable => "lookup_unavailable",
            FailureKind::Transport => "transport",
            FailureKind::ConfirmationPending => "confirmation_pending",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Terminal failure of an assignment flow.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssignError {
    #[error(transparent)]
    InvalidInput(#[from] InputError),

    #[error(transparent)]
    InvalidKey(#[from] SignerError),

    #[error("node unreachable: {0}")]
    Unreachable(String),

    #[error("invalid node response: {0}")]
    InvalidResponse(String),

    #[error("network mismatch: {0}")]
    NetworkMismatch(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("credential not found: {0}")]
    CredentialNotFound(String),

    #[error("credential subgraph unavailable: {0}")]
    LookupUnavailable(String),

    #[error("transport failure after {attempts} attempt(s): {detail}")]
    Transport { attempts: u32, detail: String },

    #[error("assignment accepted but not yet confirmed (reference {reference})")]
    ConfirmationPending { reference: String },
}

impl AssignError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AssignError::InvalidInput(_) => FailureKind::InvalidInput,
            AssignError::InvalidKey(_) => FailureKind::InvalidKey,
            AssignError::Unreachable(_) => FailureKind::Unreachable,
            AssignError::InvalidResponse(_) => FailureKind::InvalidResponse,
            AssignError::NetworkMismatch(_) => FailureKind::NetworkMismatch,
            AssignError::Unauthorized(_) => FailureKind::Unauthorized,
            AssignError::CredentialNotFound(_) => FailureKind::CredentialNotFound,
            AssignError::LookupUnavailable(_) => FailureKind::LookupUnavailable,
            AssignError::Transport { .. } => FailureKind::Transport,
            AssignError::ConfirmationPending { .. } => FailureKind::ConfirmationPending,
        }
    }

    /// What the operator should do next.
    pub fn hint(&self) -> &'static str {
        match self.kind() {
            FailureKind::InvalidInput => "check the credential id and node URL",
            FailureKind::InvalidKey => {
                "invalid private key format, expected 0x followed by 64 hex digits"
            }
            FailureKind::Unreachable => "node unreachable, retry later",
            FailureKind::InvalidResponse => {
                "node does not speak the expected Manager Mode API, check [node_api] settings"
            }
            FailureKind::NetworkMismatch => "node runs on a different network, check --testnet",
            FailureKind::Unauthorized => "sign with the credential owner or its delegated signer",
            FailureKind::CredentialNotFound => "credential does not exist on this network",
            FailureKind::LookupUnavailable => {
                "credential subgraph unreachable, retry later or pass --skip-ownership-check"
            }
            FailureKind::Transport => "transient failure, retry later",
            FailureKind::ConfirmationPending => {
                "re-check the assignment status later, do not resubmit"
            }
        }
    }
}

impl From<NodeError> for AssignError {
    fn from(err: NodeError) -> Self {
        match err {
            NodeError::Unreachable(detail) => AssignError::Unreachable(detail),
            NodeError::InvalidResponse(detail) => AssignError::InvalidResponse(detail),
        }
    }
}

impl From<LookupError> for AssignError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::NotFound(id) => AssignError::CredentialNotFound(id),
            e @ LookupError::Unauthorized { .. } => AssignError::Unauthorized(e.to_string()),
            LookupError::Query(detail) => AssignError::LookupUnavailable(detail),
        }
    }
}
