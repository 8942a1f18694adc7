//! Activity Stub
//!
//! Retrying boundary between the orchestrator and the ledger. Every call
//! races the start-to-close timeout; failures are retried per the
//! [`RetryPolicy`](super::retry::RetryPolicy). Both the timeout and the
//! backoff are measured on the durable runtime's clock. The orchestrator only sees the final success or an
//! [`ActivityFailure`].

use std::future::Future;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, error, warn};

use super::adapters::AccountOperations;
use super::error::{ActivityError, ActivityFailure, ActivityKind};
use super::retry::ActivityOptions;
use super::runtime::DurableRuntime;
use super::types::{ChargeResult, ExecutionScenario};

/// Retrying proxy over [`AccountOperations`]
pub struct ActivityStub {
    accounts: Arc<dyn AccountOperations>,
    runtime: Arc<dyn DurableRuntime>,
    options: ActivityOptions,
}

impl ActivityStub {
    pub fn new(
        accounts: Arc<dyn AccountOperations>,
        runtime: Arc<dyn DurableRuntime>,
        options: ActivityOptions,
    ) -> Self {
        Self {
            accounts,
            runtime,
            options,
        }
    }

    pub fn options(&self) -> &ActivityOptions {
        &self.options
    }

    pub async fn validate(&self, scenario: ExecutionScenario) -> Result<bool, ActivityFailure> {
        let accounts = self.accounts.as_ref();
        self.execute(ActivityKind::Validate, move || accounts.validate(scenario))
            .await
    }

    pub async fn withdraw(
        &self,
        amount: Decimal,
        scenario: ExecutionScenario,
    ) -> Result<(), ActivityFailure> {
        let accounts = self.accounts.as_ref();
        self.execute(ActivityKind::Withdraw, move || accounts.withdraw(amount, scenario))
            .await
    }

    /// Every attempt reuses `idempotency_key`, so redelivery commits at most once
    pub async fn deposit(
        &self,
        idempotency_key: &str,
        amount: Decimal,
        scenario: ExecutionScenario,
    ) -> Result<ChargeResult, ActivityFailure> {
        let accounts = self.accounts.as_ref();
        self.execute(ActivityKind::Deposit, move || {
            accounts.deposit(idempotency_key, amount, scenario)
        })
        .await
    }

    pub async fn undo_withdraw(&self, amount: Decimal) -> Result<(), ActivityFailure> {
        let accounts = self.accounts.as_ref();
        self.execute(ActivityKind::UndoWithdraw, move || accounts.undo_withdraw(amount))
            .await
    }

    async fn execute<T, F, Fut>(
        &self,
        activity: ActivityKind,
        mut call: F,
    ) -> Result<T, ActivityFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ActivityError>>,
    {
        let timeout = self.options.start_to_close_timeout;
        let policy = &self.options.retry_policy;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let outcome = tokio::select! {
                result = call() => Some(result),
                _ = self.runtime.sleep(timeout) => None,
            };

            let cause = match outcome {
                Some(Ok(value)) => {
                    debug!(
                        adapter = self.accounts.name(),
                        activity = %activity,
                        attempt,
                        "Activity completed"
                    );
                    return Ok(value);
                }
                Some(Err(e)) => e,
                None => ActivityError::timeout(activity, timeout.as_secs()),
            };

            if !policy.should_retry(&cause, attempt) {
                error!(
                    adapter = self.accounts.name(),
                    activity = %activity,
                    attempt,
                    error = %cause,
                    "Activity failed, not retrying"
                );
                return Err(ActivityFailure {
                    activity,
                    attempts: attempt,
                    cause,
                });
            }

            let backoff = policy.backoff(attempt);
            warn!(
                adapter = self.accounts.name(),
                activity = %activity,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %cause,
                "Activity failed (will retry)"
            );
            self.runtime.sleep(backoff).await;
        }
    }
}
