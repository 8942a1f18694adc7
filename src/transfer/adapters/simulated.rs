//! Simulated Ledger
//!
//! In-memory ledger that reacts to the execution scenario:
//! - `HUMAN_IN_LOOP`: validation declines, an approval is required
//! - `API_DOWNTIME`: the first few withdraw attempts fail transiently
//! - `INVALID_ACCOUNT`: deposit fails with the non-retryable invalid-account error
//!
//! Deposits are idempotent per key: a redelivered key returns the charge
//! that was committed the first time.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AccountOperations;
use crate::transfer::error::ActivityError;
use crate::transfer::types::{ChargeResult, ExecutionScenario};

/// Withdraw attempts that fail before the simulated API comes back
pub const DEFAULT_DOWNTIME_ATTEMPTS: u32 = 4;

#[derive(Debug, Default)]
struct LedgerState {
    withdrawn: Decimal,
    deposited: Decimal,
    /// Committed deposits by idempotency key
    processed: HashMap<String, ChargeResult>,
    withdraw_attempts: u32,
    undo_count: u32,
}

/// Scenario-driven in-memory ledger
pub struct SimulatedLedger {
    state: Mutex<LedgerState>,
    downtime_attempts: u32,
}

impl SimulatedLedger {
    pub fn new() -> Self {
        Self::with_downtime_attempts(DEFAULT_DOWNTIME_ATTEMPTS)
    }

    /// Ledger whose withdraw fails `attempts` times under `API_DOWNTIME`
    pub fn with_downtime_attempts(attempts: u32) -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            downtime_attempts: attempts,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Net amount debited from source accounts
    pub fn withdrawn_total(&self) -> Decimal {
        self.lock().withdrawn
    }

    /// Amount credited to target accounts
    pub fn deposited_total(&self) -> Decimal {
        self.lock().deposited
    }

    /// Number of distinct committed deposits
    pub fn deposit_count(&self) -> usize {
        self.lock().processed.len()
    }

    pub fn withdraw_attempts(&self) -> u32 {
        self.lock().withdraw_attempts
    }

    pub fn undo_count(&self) -> u32 {
        self.lock().undo_count
    }
}

impl Default for SimulatedLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountOperations for SimulatedLedger {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn validate(&self, scenario: ExecutionScenario) -> Result<bool, ActivityError> {
        let valid = scenario != ExecutionScenario::HumanInLoop;
        debug!(scenario = %scenario, valid, "Validate");
        Ok(valid)
    }

    async fn withdraw(
        &self,
        amount: Decimal,
        scenario: ExecutionScenario,
    ) -> Result<(), ActivityError> {
        let mut state = self.lock();
        state.withdraw_attempts += 1;

        if scenario == ExecutionScenario::ApiDowntime
            && state.withdraw_attempts <= self.downtime_attempts
        {
            warn!(
                attempt = state.withdraw_attempts,
                "Simulated API downtime during withdraw"
            );
            return Err(ActivityError::retryable(
                "ServiceUnavailable",
                "Ledger API is down",
            ));
        }

        state.withdrawn += amount;
        info!(amount = %amount, "Withdraw committed");
        Ok(())
    }

    async fn deposit(
        &self,
        idempotency_key: &str,
        amount: Decimal,
        scenario: ExecutionScenario,
    ) -> Result<ChargeResult, ActivityError> {
        let mut state = self.lock();

        if let Some(existing) = state.processed.get(idempotency_key) {
            debug!(idempotency_key, "Deposit already processed");
            return Ok(existing.clone());
        }

        if scenario == ExecutionScenario::InvalidAccount {
            warn!(idempotency_key, "Deposit rejected: invalid account");
            return Err(ActivityError::invalid_account(
                "Deposit activity failed, account is invalid",
            ));
        }

        let charge = ChargeResult::new(format!("example-charge-id-{}", Uuid::new_v4()));
        state.deposited += amount;
        state
            .processed
            .insert(idempotency_key.to_string(), charge.clone());
        info!(amount = %amount, charge_id = %charge.charge_id, "Deposit committed");
        Ok(charge)
    }

    async fn undo_withdraw(&self, amount: Decimal) -> Result<(), ActivityError> {
        let mut state = self.lock();
        state.withdrawn -= amount;
        state.undo_count += 1;
        info!(amount = %amount, "Withdraw reverted");
        Ok(())
    }
}
