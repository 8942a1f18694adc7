//! Transfer Core Types
//!
//! Type definitions shared by the orchestrator, the ledger adapters and the
//! control surface.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::TransferError;

/// Transfer instance ID - ULID-based unique identifier
///
/// One orchestration instance exists per ID; the coordinator rejects a
/// second start under the same ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferId(ulid::Ulid);

impl TransferId {
    /// Generate a new unique TransferId
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Get the inner ULID value
    pub fn inner(&self) -> ulid::Ulid {
        self.0
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransferId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

/// Execution scenario selecting fault-injection and visibility behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionScenario {
    /// Validation passes, every step succeeds
    #[default]
    Standard,
    /// Publishes "Withdraw"/"Deposit" checkpoints and pauses so they can be observed
    AdvancedVisibility,
    /// Ledger refuses automatic validation; a human approval is required
    HumanInLoop,
    /// Withdraw fails transiently a few times before succeeding
    ApiDowntime,
    /// Orchestration logic raises a simulated bug after the withdraw
    BugInWorkflow,
    /// Deposit fails with a non-retryable invalid-account error
    InvalidAccount,
}

impl ExecutionScenario {
    pub const ALL: [ExecutionScenario; 6] = [
        ExecutionScenario::Standard,
        ExecutionScenario::AdvancedVisibility,
        ExecutionScenario::HumanInLoop,
        ExecutionScenario::ApiDowntime,
        ExecutionScenario::BugInWorkflow,
        ExecutionScenario::InvalidAccount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionScenario::Standard => "STANDARD",
            ExecutionScenario::AdvancedVisibility => "ADVANCED_VISIBILITY",
            ExecutionScenario::HumanInLoop => "HUMAN_IN_LOOP",
            ExecutionScenario::ApiDowntime => "API_DOWNTIME",
            ExecutionScenario::BugInWorkflow => "BUG_IN_WORKFLOW",
            ExecutionScenario::InvalidAccount => "INVALID_ACCOUNT",
        }
    }
}

impl fmt::Display for ExecutionScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExecutionScenario {
    type Err = String;

    /// Accepts the wire name in any case, with `-` or `_` separators
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_").to_ascii_uppercase();
        ExecutionScenario::ALL
            .into_iter()
            .find(|scenario| scenario.as_str() == normalized)
            .ok_or_else(|| format!("Unknown execution scenario: {}", s))
    }
}

/// Input of one transfer orchestration. Immutable for the instance lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferParameters {
    /// Source account identifier
    pub from_account: String,
    /// Target account identifier
    pub to_account: String,
    /// Amount to move, must be positive
    pub amount: Decimal,
    #[serde(default)]
    pub scenario: ExecutionScenario,
}

impl TransferParameters {
    pub fn new(
        from_account: impl Into<String>,
        to_account: impl Into<String>,
        amount: Decimal,
        scenario: ExecutionScenario,
    ) -> Self {
        Self {
            from_account: from_account.into(),
            to_account: to_account.into(),
            amount,
            scenario,
        }
    }

    /// Reject parameters that can never produce a valid transfer
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.amount <= Decimal::ZERO {
            return Err(TransferError::InvalidAmount);
        }
        Ok(())
    }
}

/// Result of a committed deposit
///
/// Empty until the deposit succeeds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeResult {
    pub charge_id: String,
}

impl ChargeResult {
    pub fn new(charge_id: impl Into<String>) -> Self {
        Self {
            charge_id: charge_id.into(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.charge_id.is_empty()
    }
}
