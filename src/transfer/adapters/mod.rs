//! Ledger Adapters
//!
//! The orchestrator only moves money through [`AccountOperations`]. Each call
//! goes through the retrying boundary, so implementations report transient
//! trouble as a retryable [`ActivityError`] and let the policy decide.

pub mod simulated;

pub use simulated::SimulatedLedger;

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::error::ActivityError;
use super::types::{ChargeResult, ExecutionScenario};

/// Ledger operations consumed by the transfer orchestrator
#[async_trait]
pub trait AccountOperations: Send + Sync {
    /// Get adapter name for logging
    fn name(&self) -> &'static str;

    /// Check whether the transfer may proceed without human approval
    async fn validate(&self, scenario: ExecutionScenario) -> Result<bool, ActivityError>;

    /// Debit the source account
    ///
    /// Not idempotent; the ledger must not apply a redelivered attempt twice.
    async fn withdraw(
        &self,
        amount: Decimal,
        scenario: ExecutionScenario,
    ) -> Result<(), ActivityError>;

    /// Credit the target account
    ///
    /// # Idempotency
    /// A redelivery with the same `idempotency_key` must return the original
    /// result without committing a second credit.
    async fn deposit(
        &self,
        idempotency_key: &str,
        amount: Decimal,
        scenario: ExecutionScenario,
    ) -> Result<ChargeResult, ActivityError>;

    /// Reverse a committed withdraw
    ///
    /// Only called during compensation after a deposit failed terminally.
    async fn undo_withdraw(&self, amount: Decimal) -> Result<(), ActivityError>;
}


#[cfg(test)]
pub use mock::MockAccounts;
