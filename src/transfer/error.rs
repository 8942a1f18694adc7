//! Transfer Error Types
//!
//! Three layers:
//! - [`ActivityError`]: what a single ledger call returns
//! - [`ActivityFailure`]: what the retrying boundary surfaces once it gives up
//! - [`TransferError`]: terminal outcome of an orchestration or a rejected control request

use std::fmt;

use thiserror::Error;

/// Error type raised by the ledger for an invalid source/target account.
/// Excluded from retry by the default policy.
pub const INVALID_ACCOUNT_ERROR: &str = "InvalidAccount";

/// Error type used when an attempt exceeds the start-to-close timeout
pub const START_TO_CLOSE_TIMEOUT_ERROR: &str = "StartToCloseTimeout";

/// Ledger operations guarded by the retrying boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    Validate,
    Withdraw,
    Deposit,
    UndoWithdraw,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Validate => "validate",
            ActivityKind::Withdraw => "withdraw",
            ActivityKind::Deposit => "deposit",
            ActivityKind::UndoWithdraw => "undoWithdraw",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure of one ledger call attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{error_type}: {message}")]
pub struct ActivityError {
    /// Classifier matched against the retry policy exclusion list
    pub error_type: String,
    pub message: String,
    /// Set by the ledger when no retry can ever succeed
    pub non_retryable: bool,
}

impl ActivityError {
    pub fn retryable(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            non_retryable: false,
        }
    }

    pub fn non_retryable(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            non_retryable: true,
        }
    }

    /// Invalid account. Not flagged non-retryable itself; the retry
    /// policy's exclusion list stops it.
    pub fn invalid_account(message: impl Into<String>) -> Self {
        Self::retryable(INVALID_ACCOUNT_ERROR, message)
    }

    pub fn timeout(activity: ActivityKind, timeout_secs: u64) -> Self {
        Self::retryable(
            START_TO_CLOSE_TIMEOUT_ERROR,
            format!("{} did not complete within {}s", activity, timeout_secs),
        )
    }
}

/// Final failure of a ledger call after the retry policy gave up
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Activity {activity} failed after {attempts} attempt(s): {cause}")]
pub struct ActivityFailure {
    pub activity: ActivityKind,
    pub attempts: u32,
    #[source]
    pub cause: ActivityError,
}

impl ActivityFailure {
    /// Message of the underlying ledger error
    pub fn original_message(&self) -> &str {
        &self.cause.message
    }
}

/// Transfer error types
#[derive(Error, Debug, Clone)]
pub enum TransferError {
    // === Input Errors ===
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    // === Control Surface Errors ===
    #[error("Validation Failed: {0}")]
    ValidationRejected(String),

    // === Terminal Orchestration Errors ===
    #[error("Approval not received within {seconds} seconds")]
    ApprovalTimeout { seconds: u64 },

    #[error(transparent)]
    Activity(#[from] ActivityFailure),

    #[error("{0}")]
    DepositFailed(String),

    #[error("{0}")]
    WorkflowBug(String),

    // === Instance Errors ===
    #[error("Transfer already started: {0}")]
    DuplicateTransfer(String),

    #[error("Transfer not found: {0}")]
    TransferNotFound(String),

    #[error("Internal system error: {0}")]
    SystemError(String),
}

impl TransferError {
    /// Error kind reported to callers
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::InvalidAmount => "INVALID_AMOUNT",
            TransferError::ValidationRejected(_) => "VALIDATION_REJECTED",
            TransferError::ApprovalTimeout { .. } => "ApprovalTimeout",
            TransferError::Activity(_) => "ACTIVITY_FAILURE",
            TransferError::DepositFailed(_) => "DepositFailed",
            TransferError::WorkflowBug(_) => "WORKFLOW_BUG",
            TransferError::DuplicateTransfer(_) => "DUPLICATE_TRANSFER",
            TransferError::TransferNotFound(_) => "TRANSFER_NOT_FOUND",
            TransferError::SystemError(_) => "SYSTEM_ERROR",
        }
    }

    /// Whether this error ended a running orchestration instance
    pub fn is_terminal_failure(&self) -> bool {
        matches!(
            self,
            TransferError::ApprovalTimeout { .. }
                | TransferError::Activity(_)
                | TransferError::DepositFailed(_)
                | TransferError::WorkflowBug(_)
        )
    }
}

impl From<tokio::task::JoinError> for TransferError {
    fn from(e: tokio::task::JoinError) -> Self {
        TransferError::SystemError(e.to_string())
    }
}
