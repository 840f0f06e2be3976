//! hcn-interactor - CLI for Hypercycle Manager Mode assignments
//!
//! This crate provides a command-line interface for:
//! - Assigning a License/ANFE to a Manager Mode node
//! - Looking up credential ownership on the Hypercycle subgraphs
//! - Deriving the signing account of a private key
//! - Managing the interactor configuration file

pub mod cli;
pub mod config;
pub mod output;

#[cfg(test)]
mod proptests;

pub use cli::Cli;
pub use config::{CliOverrides, Config};
pub use output::{JsonResponse, OutputFormat, OutputFormatter};

use hcn_core::{AssignmentOutcome, AssignmentReport, FailureKind};

/// Exit codes for CLI operations
///
/// - 0: Success - assignment confirmed (or command completed)
/// - 1: General error - unspecified error occurred
/// - 2: Invalid input - bad credential, node URL, key or network
/// - 3: Rejected - the node refused the assignment
/// - 4: Unauthorized - signer does not control the credential, or it does not exist
/// - 5: Unreachable - node or credential subgraph could not be reached
/// - 6: Transport failure - retries exhausted or confirmation still pending
/// - 7: Invalid response - node answered outside the Manager Mode API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    InvalidInput = 2,
    Rejected = 3,
    Unauthorized = 4,
    Unreachable = 5,
    TransportFailure = 6,
    InvalidResponse = 7,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<FailureKind> for ExitCode {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::InvalidInput | FailureKind::InvalidKey | FailureKind::NetworkMismatch => {
                ExitCode::InvalidInput
            }
            FailureKind::Unauthorized | FailureKind::CredentialNotFound => ExitCode::Unauthorized,
            FailureKind::Unreachable | FailureKind::LookupUnavailable => ExitCode::Unreachable,
            FailureKind::Transport | FailureKind::ConfirmationPending => ExitCode::TransportFailure,
            FailureKind::InvalidResponse => ExitCode::InvalidResponse,
        }
    }
}

impl ExitCode {
    /// Convert to process exit code
    pub fn to_exit_code(self) -> std::process::ExitCode {
        std::process::ExitCode::from(self as u8)
    }

    pub fn from_report(report: &AssignmentReport) -> Self {
        match &report.outcome {
            AssignmentOutcome::Confirmed(_) => ExitCode::Success,
            AssignmentOutcome::Rejected(_) => ExitCode::Rejected,
            AssignmentOutcome::Failed(err) => err.kind().into(),
        }
    }

    /// Get the exit code name as a string
    pub fn name(&self) -> &'static str {
        match self {
            ExitCode::Success => "SUCCESS",
            ExitCode::GeneralError => "GENERAL_ERROR",
            ExitCode::InvalidInput => "INVALID_INPUT",
            ExitCode::Rejected => "REJECTED",
            ExitCode::Unauthorized => "UNAUTHORIZED",
            ExitCode::Unreachable => "UNREACHABLE",
            ExitCode::TransportFailure => "TRANSPORT_FAILURE",
            ExitCode::InvalidResponse => "INVALID_RESPONSE",
        }
    }

    /// Get a human-readable description of the exit code
    pub fn description(&self) -> &'static str {
        match self {
            ExitCode::Success => "Operation completed successfully",
            ExitCode::GeneralError => "An unspecified error occurred",
            ExitCode::InvalidInput => "Invalid credential, node URL, key or network",
            ExitCode::Rejected => "The node rejected the assignment",
            ExitCode::Unauthorized => "Signer does not control the credential",
            ExitCode::Unreachable => "Node or subgraph could not be reached",
            ExitCode::TransportFailure => "Submission did not settle after retries",
            ExitCode::InvalidResponse => "Node response did not match the Manager Mode API",
        }
    }
}

#[cfg(test)]
mod exit_code_tests {
    use super::*;
    use hcn_core::{AssignError, Confirmation, InputError, Network, RejectionReason};

    fn report(outcome: AssignmentOutcome) -> AssignmentReport {
        AssignmentReport {
            credential: "1".into(),
            node_url: "http://node.example".into(),
            network: Network::Mainnet,
            signer: None,
            node_id: None,
            record: None,
            outcome,
            attempts: 0,
            states: vec![],
        }
    }

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success as i32, 0);
        assert_eq!(ExitCode::GeneralError as i32, 1);
        assert_eq!(ExitCode::InvalidInput as i32, 2);
        assert_eq!(ExitCode::Rejected as i32, 3);
        assert_eq!(ExitCode::Unauthorized as i32, 4);
        assert_eq!(ExitCode::Unreachable as i32, 5);
        assert_eq!(ExitCode::TransportFailure as i32, 6);
        assert_eq!(ExitCode::InvalidResponse as i32, 7);
    }

    #[test]
    fn test_exit_code_names() {
        assert_eq!(ExitCode::Success.name(), "SUCCESS");
        assert_eq!(ExitCode::Rejected.name(), "REJECTED");
        assert_eq!(ExitCode::TransportFailure.name(), "TRANSPORT_FAILURE");
        assert!(!ExitCode::InvalidResponse.description().is_empty());
    }

    #[test]
    fn test_failure_kind_mapping() {
        assert_eq!(ExitCode::from(FailureKind::InvalidKey), ExitCode::InvalidInput);
        assert_eq!(ExitCode::from(FailureKind::NetworkMismatch), ExitCode::InvalidInput);
        assert_eq!(ExitCode::from(FailureKind::CredentialNotFound), ExitCode::Unauthorized);
        assert_eq!(ExitCode::from(FailureKind::Unreachable), ExitCode::Unreachable);
        assert_eq!(ExitCode::from(FailureKind::LookupUnavailable), ExitCode::Unreachable);
        assert_eq!(
            ExitCode::from(FailureKind::ConfirmationPending),
            ExitCode::TransportFailure
        );
        assert_eq!(ExitCode::from(FailureKind::InvalidResponse), ExitCode::InvalidResponse);
    }

    #[test]
    fn test_from_report() {
        let confirmed = report(AssignmentOutcome::Confirmed(Confirmation {
            reference: "r".into(),
            pending: true,
        }));
        assert_eq!(ExitCode::from_report(&confirmed), ExitCode::Success);

        let rejected = report(AssignmentOutcome::Rejected(RejectionReason {
            status: Some(403),
            reason: "already assigned".into(),
        }));
        assert_eq!(ExitCode::from_report(&rejected), ExitCode::Rejected);

        let failed = report(AssignmentOutcome::Failed(AssignError::InvalidInput(
            InputError::Credential("abc".into()),
        )));
        assert_eq!(ExitCode::from_report(&failed), ExitCode::InvalidInput);
    }
}
