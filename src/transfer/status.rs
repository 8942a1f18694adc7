//! Transfer progress snapshot owned by one orchestration instance.

use serde::{Deserialize, Serialize};

use super::state::TransferState;
use super::types::ChargeResult;

/// Progress reported before the first phase runs
pub const INITIAL_PROGRESS: u8 = 10;

/// Mutable progress of a running transfer
#[derive(Debug, Clone)]
pub struct TransferStatus {
    progress_percentage: u8,
    state: TransferState,
    charge_result: ChargeResult,
    approval_timeout_secs: u64,
}

impl TransferStatus {
    pub fn new(approval_timeout_secs: u64) -> Self {
        Self {
            progress_percentage: INITIAL_PROGRESS,
            state: TransferState::Starting,
            charge_result: ChargeResult::default(),
            approval_timeout_secs,
        }
    }

    /// Progress is clamped to 100
    pub fn update_progress(&mut self, percentage: u8) {
        self.progress_percentage = percentage.min(100);
    }

    pub fn update_state(&mut self, state: TransferState) {
        debug_assert!(
            self.state.can_transition_to(state),
            "illegal transition {} -> {}",
            self.state,
            state
        );
        self.state = state;
    }

    pub fn set_charge_result(&mut self, result: ChargeResult) {
        self.charge_result = result;
    }

    pub fn progress_percentage(&self) -> u8 {
        self.progress_percentage
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn charge_result(&self) -> &ChargeResult {
        &self.charge_result
    }

    pub fn approval_timeout_secs(&self) -> u64 {
        self.approval_timeout_secs
    }

    /// Point-in-time copy returned by the state query
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            progress_percentage: self.progress_percentage,
            transfer_state: self.state,
            workflow_status: String::new(),
            charge_result: self.charge_result.clone(),
            approval_time: self.approval_timeout_secs,
        }
    }
}

/// Result of the state query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub progress_percentage: u8,
    pub transfer_state: TransferState,
    /// Reserved; always empty
    pub workflow_status: String,
    pub charge_result: ChargeResult,
    /// Approval timeout in seconds
    pub approval_time: u64,
}
