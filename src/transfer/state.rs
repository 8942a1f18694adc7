//! Transfer Lifecycle State
//!
//! ```text
//! STARTING → RUNNING → WAITING → RUNNING → FINISHED
//!               └──────────────────┘
//! ```
//!
//! WAITING is only entered when the ledger declines to validate the
//! transfer on its own and a human approval is required.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle state of one transfer orchestration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferState {
    /// Instance created, settle delay in progress
    Starting,

    /// Executing a phase (validation, withdraw, deposit, completion)
    Running,

    /// Suspended until an approval signal/update arrives or the timeout elapses
    Waiting,

    /// Terminal: deposit committed, charge result available
    Finished,
}

impl TransferState {
    /// Check if this is the terminal success state
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Finished)
    }

    /// Check if the instance is suspended on the approval wait
    #[inline]
    pub fn is_waiting(&self) -> bool {
        matches!(self, TransferState::Waiting)
    }

    /// Wire value used in state snapshots
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Starting => "starting",
            TransferState::Running => "running",
            TransferState::Waiting => "waiting",
            TransferState::Finished => "finished",
        }
    }

    /// Check whether moving to `next` is a legal transition.
    ///
    /// Transitions are strictly forward, except that RUNNING is re-entered
    /// after WAITING. Re-asserting the current state is allowed.
    pub fn can_transition_to(&self, next: TransferState) -> bool {
        use TransferState::*;
        match (self, next) {
            (a, b) if *a == b => !a.is_terminal(),
            (Starting, Running) => true,
            (Running, Waiting) | (Running, Finished) => true,
            (Waiting, Running) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransferState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starting" => Ok(TransferState::Starting),
            "running" => Ok(TransferState::Running),
            "waiting" => Ok(TransferState::Waiting),
            "finished" => Ok(TransferState::Finished),
            other => Err(format!("Unknown transfer state: {}", other)),
        }
    }
}
