//! Transfer Orchestrator
//!
//! Drives one transfer through its phases:
//!
//! ```text
//! init (25 → 50) → validate ─┬─────────────────────────→ withdraw (60) → deposit → complete (80 → 100)
//!                            └→ WAITING ─approval─→ ┘          │
//!                                  └─timeout→ ApprovalTimeout   └─deposit fails→ undoWithdraw → DepositFailed
//! ```
//!
//! # Exclusivity
//!
//! Status and the approval flag live behind one mutex shared with every
//! [`TransferHandle`]. Phases take the lock only for short synchronous
//! updates and never across a suspension point, so queries, signals and
//! updates each observe and apply a consistent state.
//!
//! Once the transfer reaches a terminal outcome the instance is closed:
//! signals become no-ops and updates are rejected. The approval timeout is
//! decided under the lock, so an approval racing the deadline either wins
//! before the instance closes or is rejected after it.
//!
//! # Compensation
//!
//! Only a terminal failure of the deposit call is compensated. Every other
//! failure, including the injected workflow bug that happens after the
//! withdraw, propagates as is.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use super::activities::ActivityStub;
use super::adapters::AccountOperations;
use super::error::{ActivityKind, TransferError};
use super::runtime::DurableRuntime;
use super::state::TransferState;
use super::status::{StateSnapshot, TransferStatus};
use super::types::{ChargeResult, ExecutionScenario, TransferId, TransferParameters};
use crate::config::WorkflowConfig;

/// Reply of an accepted approval update
pub const APPROVAL_CONFIRMATION: &str = "successfully approved transfer";

/// Message raised by the injected workflow bug
pub const WORKFLOW_BUG_MESSAGE: &str = "Workflow Bug!";

struct Instance {
    status: TransferStatus,
    /// Set by an approval signal or update, never reset
    approved: bool,
    /// Set once the transfer reached a terminal outcome
    closed: bool,
}

struct Shared {
    transfer_id: TransferId,
    instance: Mutex<Instance>,
    /// Wakes the approval wait
    approval: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Instance> {
        self.instance.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Control surface of a running transfer: query, approval signal, approval update
#[derive(Clone)]
pub struct TransferHandle {
    shared: Arc<Shared>,
}

impl TransferHandle {
    pub fn transfer_id(&self) -> TransferId {
        self.shared.transfer_id
    }

    /// Point-in-time state query. No side effects.
    pub fn get_state(&self) -> StateSnapshot {
        self.shared.lock().status.snapshot()
    }

    pub fn is_approved(&self) -> bool {
        self.shared.lock().approved
    }

    /// True once the transfer has a terminal outcome
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Approval signal. Fire-and-forget: ignored unless the transfer is WAITING.
    pub fn approve_transfer(&self) {
        let transfer_id = self.shared.transfer_id;
        info!(transfer_id = %transfer_id, "Approve signal received");

        let applied = {
            let mut instance = self.shared.lock();
            if !instance.closed && instance.status.state().is_waiting() {
                instance.approved = true;
                true
            } else {
                false
            }
        };

        if applied {
            self.shared.approval.notify_one();
        } else {
            info!(
                transfer_id = %transfer_id,
                "Signal not applied: transfer is not waiting for approval"
            );
        }
    }

    /// Validator of the approval update; rejects without changing state
    pub fn approve_transfer_update_validator(&self) -> Result<(), TransferError> {
        validate_approval_update(&self.shared.lock())
    }

    /// Approval update. Validation and apply run under the same lock hold,
    /// so two concurrent updates cannot both pass the validator.
    pub fn approve_transfer_update(&self) -> Result<String, TransferError> {
        let transfer_id = self.shared.transfer_id;
        info!(transfer_id = %transfer_id, "Approve update received: validating");

        {
            let mut instance = self.shared.lock();
            if let Err(e) = validate_approval_update(&instance) {
                warn!(transfer_id = %transfer_id, error = %e, "Approve update rejected");
                return Err(e);
            }
            info!(transfer_id = %transfer_id, "Approve update validated: approving transfer");
            instance.approved = true;
        }

        self.shared.approval.notify_one();
        Ok(APPROVAL_CONFIRMATION.to_string())
    }
}

fn validate_approval_update(instance: &Instance) -> Result<(), TransferError> {
    if instance.approved {
        return Err(TransferError::ValidationRejected(
            "Transfer already approved".to_string(),
        ));
    }
    if instance.closed || !instance.status.state().is_waiting() {
        return Err(TransferError::ValidationRejected(
            "Transfer doesn't require approval".to_string(),
        ));
    }
    Ok(())
}

/// State machine of one transfer
pub struct TransferOrchestrator {
    shared: Arc<Shared>,
    activities: ActivityStub,
    runtime: Arc<dyn DurableRuntime>,
    config: WorkflowConfig,
}

impl TransferOrchestrator {
    pub fn new(
        transfer_id: TransferId,
        accounts: Arc<dyn AccountOperations>,
        runtime: Arc<dyn DurableRuntime>,
        config: WorkflowConfig,
    ) -> Self {
        let activities = ActivityStub::new(accounts, runtime.clone(), config.activity_options());
        let shared = Arc::new(Shared {
            transfer_id,
            instance: Mutex::new(Instance {
                status: TransferStatus::new(config.approval_timeout_secs),
                approved: false,
                closed: false,
            }),
            approval: Notify::new(),
        });

        Self {
            shared,
            activities,
            runtime,
            config,
        }
    }

    pub fn transfer_id(&self) -> TransferId {
        self.shared.transfer_id
    }

    pub fn handle(&self) -> TransferHandle {
        TransferHandle {
            shared: self.shared.clone(),
        }
    }

    /// Run the transfer to a terminal outcome
    ///
    /// The instance is closed on every exit, success or failure.
    pub async fn transfer(&self, params: &TransferParameters) -> Result<ChargeResult, TransferError> {
        let outcome = self.run(params).await;
        self.shared.lock().closed = true;
        outcome
    }

    async fn run(&self, params: &TransferParameters) -> Result<ChargeResult, TransferError> {
        params.validate()?;

        let transfer_id = self.shared.transfer_id;
        info!(
            transfer_id = %transfer_id,
            from = %params.from_account,
            to = %params.to_account,
            amount = %params.amount,
            scenario = %params.scenario,
            "Transfer started"
        );

        match self.run_phases(params).await {
            Ok(charge) => {
                info!(
                    transfer_id = %transfer_id,
                    charge_id = %charge.charge_id,
                    "Transfer finished"
                );
                Ok(charge)
            }
            Err(e) => Err(self.handle_transfer_failure(e, params).await),
        }
    }

    async fn run_phases(&self, params: &TransferParameters) -> Result<ChargeResult, TransferError> {
        self.initialize_transfer().await;
        self.validate_and_wait_for_approval(params).await?;
        let charge = self.execute_transfer(params).await?;
        self.complete_transfer().await;
        Ok(charge)
    }

    async fn initialize_transfer(&self) {
        self.update(|status| {
            status.update_state(TransferState::Starting);
            status.update_progress(25);
        });
        self.runtime.sleep(self.config.settle_delay()).await;
        self.update(|status| {
            status.update_progress(50);
            status.update_state(TransferState::Running);
        });
    }

    async fn validate_and_wait_for_approval(
        &self,
        params: &TransferParameters,
    ) -> Result<(), TransferError> {
        if self.activities.validate(params.scenario).await? {
            return Ok(());
        }

        let transfer_id = self.shared.transfer_id;
        info!(
            transfer_id = %transfer_id,
            "Waiting on approveTransfer signal or update"
        );

        let timeout_secs = {
            let mut instance = self.shared.lock();
            instance.status.update_state(TransferState::Waiting);
            instance.status.approval_timeout_secs()
        };

        let shared = self.shared.as_ref();
        let woken = self
            .runtime
            .await_condition(Duration::from_secs(timeout_secs), &shared.approval, &|| {
                shared.lock().approved
            })
            .await;

        // An approval that lands after the deadline but before this point still counts
        let approved = {
            let mut instance = shared.lock();
            if !instance.approved {
                instance.closed = true;
            }
            instance.approved
        };
        if approved && !woken {
            debug!(transfer_id = %transfer_id, "Approval arrived as the wait expired");
        }

        if !approved {
            warn!(
                transfer_id = %transfer_id,
                timeout_secs,
                "Approval not received in time"
            );
            return Err(TransferError::ApprovalTimeout {
                seconds: timeout_secs,
            });
        }

        info!(transfer_id = %transfer_id, "Transfer approved");
        Ok(())
    }

    async fn execute_transfer(
        &self,
        params: &TransferParameters,
    ) -> Result<ChargeResult, TransferError> {
        let transfer_id = self.shared.transfer_id;
        let scenario = params.scenario;
        let advanced_visibility = matches!(scenario, ExecutionScenario::AdvancedVisibility);

        self.update(|status| {
            status.update_progress(60);
            status.update_state(TransferState::Running);
        });

        if advanced_visibility {
            self.runtime.publish_checkpoint(&transfer_id, "Withdraw");
            self.runtime.sleep(self.config.visibility_delay()).await;
        }

        self.activities.withdraw(params.amount, scenario).await?;
        self.runtime
            .sleep(self.config.activity_retry_delay())
            .await;

        if matches!(scenario, ExecutionScenario::BugInWorkflow) {
            info!(transfer_id = %transfer_id, "Simulating workflow task failure");
            return Err(TransferError::WorkflowBug(WORKFLOW_BUG_MESSAGE.to_string()));
        }

        if advanced_visibility {
            self.runtime.publish_checkpoint(&transfer_id, "Deposit");
        }

        let idempotency_key = self.runtime.random_uuid().to_string();
        let charge = self
            .activities
            .deposit(&idempotency_key, params.amount, scenario)
            .await?;

        self.update(|status| status.set_charge_result(charge.clone()));
        Ok(charge)
    }

    async fn complete_transfer(&self) {
        self.update(|status| status.update_progress(80));
        self.runtime.sleep(self.config.workflow_delay()).await;
        self.update(|status| {
            status.update_progress(100);
            status.update_state(TransferState::Finished);
        });
    }

    /// Compensate a terminal deposit failure; pass everything else through
    async fn handle_transfer_failure(
        &self,
        e: TransferError,
        params: &TransferParameters,
    ) -> TransferError {
        let transfer_id = self.shared.transfer_id;

        match e {
            TransferError::Activity(failure) if failure.activity == ActivityKind::Deposit => {
                warn!(
                    transfer_id = %transfer_id,
                    error = %failure,
                    "Deposit failed unrecoverably, reverting withdraw"
                );
                match self.activities.undo_withdraw(params.amount).await {
                    Ok(()) => {
                        info!(transfer_id = %transfer_id, amount = %params.amount, "Withdraw reverted");
                        TransferError::DepositFailed(failure.original_message().to_string())
                    }
                    Err(undo_failure) => {
                        error!(
                            transfer_id = %transfer_id,
                            error = %undo_failure,
                            "Compensation failed, withdraw not reverted"
                        );
                        TransferError::Activity(undo_failure)
                    }
                }
            }
            other => {
                error!(
                    transfer_id = %transfer_id,
                    code = other.code(),
                    error = %other,
                    "Transfer failed"
                );
                other
            }
        }
    }

    fn update(&self, f: impl FnOnce(&mut TransferStatus)) {
        f(&mut self.shared.lock().status);
    }
}
