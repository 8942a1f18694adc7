//! Integration Tests for the Transfer Orchestrator
//!
//! Full phase runs against `MockAccounts` on a paused tokio clock, so every
//! settle delay, pacing delay and approval timeout elapses in virtual time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::{Barrier, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::WorkflowConfig;
use crate::transfer::adapters::MockAccounts;
use crate::transfer::error::{ActivityError, ActivityKind, TransferError};
use crate::transfer::retry::RetryPolicy;
use crate::transfer::runtime::{DurableRuntime, TokioRuntime};
use crate::transfer::state::TransferState;
use crate::transfer::status::StateSnapshot;
use crate::transfer::types::{ChargeResult, ExecutionScenario, TransferId, TransferParameters};
use crate::transfer::workflow::{
    APPROVAL_CONFIRMATION, TransferHandle, TransferOrchestrator, WORKFLOW_BUG_MESSAGE,
};

/// Orchestrator wired to a mock ledger and a deterministic runtime
struct TestHarness {
    accounts: Arc<MockAccounts>,
    runtime: Arc<TokioRuntime>,
    orchestrator: Arc<TransferOrchestrator>,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_config(WorkflowConfig::default())
    }

    fn with_config(config: WorkflowConfig) -> Self {
        let accounts = Arc::new(MockAccounts::new());
        let runtime = Arc::new(TokioRuntime::with_sequential_ids());
        let orchestrator = Arc::new(TransferOrchestrator::new(
            TransferId::new(),
            accounts.clone(),
            runtime.clone(),
            config,
        ));

        Self {
            accounts,
            runtime,
            orchestrator,
        }
    }

    fn handle(&self) -> TransferHandle {
        self.orchestrator.handle()
    }

    fn spawn(&self, params: TransferParameters) -> JoinHandle<Result<ChargeResult, TransferError>> {
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move { orchestrator.transfer(&params).await })
    }
}

/// No pacing delays, for tests on a real clock
fn fast_config() -> WorkflowConfig {
    WorkflowConfig {
        settle_delay_secs: 0,
        activity_retry_delay_secs: 0,
        workflow_delay_secs: 0,
        ..WorkflowConfig::default()
    }
}

/// Runtime whose approval wait ignores wake-ups and always runs to the deadline
struct DeafRuntime(TokioRuntime);

#[async_trait]
impl DurableRuntime for DeafRuntime {
    async fn sleep(&self, duration: Duration) {
        self.0.sleep(duration).await;
    }

    async fn await_condition(
        &self,
        timeout: Duration,
        _wake: &Notify,
        _condition: &(dyn Fn() -> bool + Send + Sync),
    ) -> bool {
        tokio::time::sleep(timeout).await;
        false
    }

    fn random_uuid(&self) -> Uuid {
        self.0.random_uuid()
    }

    fn publish_checkpoint(&self, transfer_id: &TransferId, step: &str) {
        self.0.publish_checkpoint(transfer_id, step);
    }
}

fn params(scenario: ExecutionScenario) -> TransferParameters {
    TransferParameters::new("acct-1001", "acct-2002", Decimal::new(100, 0), scenario)
}

async fn wait_for_state(handle: &TransferHandle, state: TransferState) {
    while handle.get_state().transfer_state != state {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Sample the state query until the transfer finishes
fn observe(handle: TransferHandle) -> JoinHandle<Vec<StateSnapshot>> {
    tokio::spawn(async move {
        let mut seen = Vec::new();
        loop {
            let snapshot = handle.get_state();
            let done = snapshot.transfer_state.is_terminal();
            seen.push(snapshot);
            if done {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    })
}

// ========================================================================
// Happy Path Tests
// ========================================================================

/// Flow: STARTING → RUNNING → FINISHED, no approval needed
#[tokio::test(start_paused = true)]
async fn test_standard_transfer_completes() {
    let harness = TestHarness::new();
    let observer = observe(harness.handle());

    let charge = harness
        .spawn(params(ExecutionScenario::Standard))
        .await
        .unwrap()
        .unwrap();

    assert!(!charge.is_empty());
    let state = harness.handle().get_state();
    assert_eq!(state.transfer_state, TransferState::Finished);
    assert_eq!(state.progress_percentage, 100);
    assert_eq!(state.charge_result, charge);

    let seen = observer.await.unwrap();
    assert!(
        seen.iter()
            .all(|s| s.transfer_state != TransferState::Waiting)
    );
    assert_eq!(
        harness.accounts.operations(),
        vec!["validate", "withdraw", "deposit"]
    );
    assert_eq!(harness.accounts.undo_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_progress_is_monotonic() {
    let harness = TestHarness::new();
    let observer = observe(harness.handle());

    harness
        .spawn(params(ExecutionScenario::Standard))
        .await
        .unwrap()
        .unwrap();

    let progress: Vec<u8> = observer
        .await
        .unwrap()
        .iter()
        .map(|s| s.progress_percentage)
        .collect();

    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    for expected in [25, 60, 80, 100] {
        assert!(progress.contains(&expected), "missing {expected} in {progress:?}");
    }
    assert_eq!(progress.last(), Some(&100));
}

#[tokio::test(start_paused = true)]
async fn test_advanced_visibility_publishes_checkpoints() {
    let harness = TestHarness::new();
    let transfer_id = harness.orchestrator.transfer_id();
    let task = harness.spawn(params(ExecutionScenario::AdvancedVisibility));

    // Withdraw checkpoint is visible during the observability pause
    wait_for_state(&harness.handle(), TransferState::Running).await;
    while harness.handle().get_state().progress_percentage < 60 {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(
        harness.runtime.current_step(&transfer_id).as_deref(),
        Some("Withdraw")
    );
    assert_eq!(harness.accounts.withdraw_count(), 0);

    task.await.unwrap().unwrap();
    assert_eq!(
        harness.runtime.checkpoints(&transfer_id),
        vec!["Withdraw", "Deposit"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_standard_transfer_publishes_no_checkpoints() {
    let harness = TestHarness::new();
    let transfer_id = harness.orchestrator.transfer_id();

    harness
        .spawn(params(ExecutionScenario::Standard))
        .await
        .unwrap()
        .unwrap();

    assert!(harness.runtime.checkpoints(&transfer_id).is_empty());
}

// ========================================================================
// Approval Tests
// ========================================================================

#[tokio::test(start_paused = true)]
async fn test_approval_timeout() {
    let harness = TestHarness::new();
    harness.accounts.set_validate_result(false);
    let handle = harness.handle();

    let task = harness.spawn(params(ExecutionScenario::HumanInLoop));

    wait_for_state(&handle, TransferState::Waiting).await;
    let waiting_since = Instant::now();
    assert_eq!(handle.get_state().transfer_state, TransferState::Waiting);

    let err = task.await.unwrap().unwrap_err();

    assert!(matches!(err, TransferError::ApprovalTimeout { seconds: 30 }));
    assert_eq!(err.code(), "ApprovalTimeout");
    assert!(waiting_since.elapsed() >= Duration::from_secs(29));
    assert_eq!(harness.accounts.withdraw_count(), 0);
    assert_eq!(harness.accounts.undo_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_approval_signal_resumes_transfer() {
    let harness = TestHarness::new();
    harness.accounts.set_validate_result(false);
    let handle = harness.handle();

    let task = harness.spawn(params(ExecutionScenario::HumanInLoop));

    wait_for_state(&handle, TransferState::Waiting).await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    handle.approve_transfer();
    assert!(handle.is_approved());

    let charge = task.await.unwrap().unwrap();

    assert!(!charge.is_empty());
    assert_eq!(handle.get_state().transfer_state, TransferState::Finished);
    assert_eq!(harness.accounts.withdraw_count(), 1);
    assert_eq!(harness.accounts.deposit_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_signal_before_waiting_is_ignored() {
    let harness = TestHarness::new();
    harness.accounts.set_validate_result(false);
    let handle = harness.handle();

    let task = harness.spawn(params(ExecutionScenario::HumanInLoop));

    // Still inside the settle delay
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(handle.get_state().transfer_state, TransferState::Starting);
    handle.approve_transfer();
    assert!(!handle.is_approved());

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, TransferError::ApprovalTimeout { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_update_after_approval_rejected_and_flag_kept() {
    let harness = TestHarness::new();
    harness.accounts.set_validate_result(false);
    let handle = harness.handle();

    let task = harness.spawn(params(ExecutionScenario::HumanInLoop));
    wait_for_state(&handle, TransferState::Waiting).await;

    handle.approve_transfer();
    let err = handle.approve_transfer_update().unwrap_err();
    assert_eq!(err.to_string(), "Validation Failed: Transfer already approved");
    assert!(handle.is_approved());

    task.await.unwrap().unwrap();
    assert_eq!(harness.accounts.withdraw_count(), 1);
}

/// Once the approval wait has timed out, no approval is accepted
#[tokio::test(start_paused = true)]
async fn test_timed_out_transfer_rejects_late_approval() {
    let harness = TestHarness::new();
    harness.accounts.set_validate_result(false);
    let handle = harness.handle();

    let err = harness
        .spawn(params(ExecutionScenario::HumanInLoop))
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, TransferError::ApprovalTimeout { .. }));
    assert!(handle.is_closed());
    assert_eq!(handle.get_state().transfer_state, TransferState::Waiting);

    let rejected = "Validation Failed: Transfer doesn't require approval";
    assert_eq!(
        handle.approve_transfer_update_validator().unwrap_err().to_string(),
        rejected
    );
    assert_eq!(
        handle.approve_transfer_update().unwrap_err().to_string(),
        rejected
    );
    handle.approve_transfer();
    assert!(!handle.is_approved());

    assert_eq!(harness.accounts.withdraw_count(), 0);
    assert_eq!(harness.accounts.deposit_count(), 0);
}

/// An approval that lands before the deadline is decided wins, even if the wait reports a timeout
#[tokio::test(start_paused = true)]
async fn test_approval_racing_deadline_is_honoured() {
    let accounts = Arc::new(MockAccounts::new());
    accounts.set_validate_result(false);
    let orchestrator = Arc::new(TransferOrchestrator::new(
        TransferId::new(),
        accounts.clone(),
        Arc::new(DeafRuntime(TokioRuntime::new())),
        WorkflowConfig::default(),
    ));
    let handle = orchestrator.handle();
    let request = params(ExecutionScenario::HumanInLoop);

    let task = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.transfer(&request).await }
    });

    wait_for_state(&handle, TransferState::Waiting).await;
    assert_eq!(
        handle.approve_transfer_update().unwrap(),
        APPROVAL_CONFIRMATION
    );

    let charge = task.await.unwrap().unwrap();
    assert!(!charge.is_empty());
    assert_eq!(accounts.withdraw_count(), 1);
    assert_eq!(accounts.deposit_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_approve_exactly_once() {
    const UPDATES: usize = 16;

    let harness = TestHarness::with_config(fast_config());
    harness.accounts.set_validate_result(false);
    let handle = harness.handle();

    let task = harness.spawn(params(ExecutionScenario::HumanInLoop));
    wait_for_state(&handle, TransferState::Waiting).await;

    let barrier = Arc::new(Barrier::new(UPDATES));
    let updates: Vec<_> = (0..UPDATES)
        .map(|_| {
            let handle = handle.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                handle.approve_transfer_update()
            })
        })
        .collect();

    let mut accepted = 0;
    let mut rejected = 0;
    for update in updates {
        match update.await.unwrap() {
            Ok(reply) => {
                assert_eq!(reply, APPROVAL_CONFIRMATION);
                accepted += 1;
            }
            Err(TransferError::ValidationRejected(msg)) => {
                assert_eq!(msg, "Transfer already approved");
                rejected += 1;
            }
            Err(other) => panic!("unexpected update outcome: {other:?}"),
        }
    }
    assert_eq!(accepted, 1);
    assert_eq!(rejected, UPDATES - 1);

    task.await.unwrap().unwrap();
    assert_eq!(harness.accounts.withdraw_count(), 1);
    assert_eq!(harness.accounts.deposit_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_signals_and_updates_approve_once() {
    const CALLERS: usize = 16;

    let harness = TestHarness::with_config(fast_config());
    harness.accounts.set_validate_result(false);
    let handle = harness.handle();

    let task = harness.spawn(params(ExecutionScenario::HumanInLoop));
    wait_for_state(&handle, TransferState::Waiting).await;

    let barrier = Arc::new(Barrier::new(CALLERS));
    let callers: Vec<_> = (0..CALLERS)
        .map(|i| {
            let handle = handle.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                if i % 2 == 0 {
                    handle.approve_transfer();
                    None
                } else {
                    Some(handle.approve_transfer_update())
                }
            })
        })
        .collect();

    let mut accepted = 0;
    for caller in callers {
        match caller.await.unwrap() {
            Some(Ok(_)) => accepted += 1,
            Some(Err(TransferError::ValidationRejected(msg))) => {
                assert_eq!(msg, "Transfer already approved")
            }
            Some(Err(other)) => panic!("unexpected update outcome: {other:?}"),
            None => {}
        }
    }
    assert!(accepted <= 1);
    assert!(handle.is_approved());

    task.await.unwrap().unwrap();
    assert_eq!(harness.accounts.withdraw_count(), 1);
    assert_eq!(harness.accounts.deposit_count(), 1);
}

// ========================================================================
// Failure & Compensation Tests
// ========================================================================

/// Withdraw succeeds, deposit fails terminally → undoWithdraw → DepositFailed
#[tokio::test(start_paused = true)]
async fn test_deposit_failure_is_compensated() {
    let harness = TestHarness::new();
    harness
        .accounts
        .set_deposit_error(Some(ActivityError::invalid_account(
            "Deposit activity failed, account is invalid",
        )));

    let err = harness
        .spawn(params(ExecutionScenario::InvalidAccount))
        .await
        .unwrap()
        .unwrap_err();

    match err {
        TransferError::DepositFailed(msg) => {
            assert_eq!(msg, "Deposit activity failed, account is invalid")
        }
        other => panic!("expected DepositFailed, got {other:?}"),
    }
    assert_eq!(harness.accounts.undo_count(), 1);
    assert_eq!(harness.accounts.undo_amounts(), vec![Decimal::new(100, 0)]);
    assert_eq!(
        harness.accounts.operations(),
        vec!["validate", "withdraw", "deposit", "undoWithdraw"]
    );
    assert!(harness.handle().get_state().charge_result.is_empty());
}

/// Transient deposit errors reuse the same idempotency key until the policy gives up
#[tokio::test(start_paused = true)]
async fn test_exhausted_deposit_retries_reuse_key_and_compensate() {
    let config = WorkflowConfig {
        retry_policy: RetryPolicy {
            maximum_attempts: Some(3),
            ..RetryPolicy::default()
        },
        ..WorkflowConfig::default()
    };
    let harness = TestHarness::with_config(config);
    harness
        .accounts
        .set_deposit_error(Some(ActivityError::retryable("ServiceUnavailable", "down")));

    let err = harness
        .spawn(params(ExecutionScenario::Standard))
        .await
        .unwrap()
        .unwrap_err();

    assert!(matches!(err, TransferError::DepositFailed(ref msg) if msg == "down"));

    let keys = harness.accounts.deposit_keys();
    assert_eq!(keys.len(), 3);
    assert!(keys.iter().all(|k| *k == Uuid::from_u128(1).to_string()));
    assert_eq!(harness.accounts.undo_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_withdraw_failure_not_compensated() {
    let harness = TestHarness::new();
    harness
        .accounts
        .set_withdraw_error(Some(ActivityError::non_retryable(
            "InsufficientFunds",
            "balance too low",
        )));

    let err = harness
        .spawn(params(ExecutionScenario::Standard))
        .await
        .unwrap()
        .unwrap_err();

    match err {
        TransferError::Activity(failure) => {
            assert_eq!(failure.activity, ActivityKind::Withdraw);
            assert_eq!(failure.attempts, 1);
        }
        other => panic!("expected withdraw failure, got {other:?}"),
    }
    assert_eq!(harness.accounts.deposit_count(), 0);
    assert_eq!(harness.accounts.undo_count(), 0);
}

/// The injected bug happens after the withdraw but is not compensated
#[tokio::test(start_paused = true)]
async fn test_workflow_bug_not_compensated() {
    let harness = TestHarness::new();

    let err = harness
        .spawn(params(ExecutionScenario::BugInWorkflow))
        .await
        .unwrap()
        .unwrap_err();

    assert!(matches!(err, TransferError::WorkflowBug(ref msg) if msg == WORKFLOW_BUG_MESSAGE));
    assert_eq!(harness.accounts.withdraw_count(), 1);
    assert_eq!(harness.accounts.deposit_count(), 0);
    assert_eq!(harness.accounts.undo_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_compensation_surfaces_undo_failure() {
    let harness = TestHarness::new();
    harness
        .accounts
        .set_deposit_error(Some(ActivityError::invalid_account("closed")));
    harness
        .accounts
        .set_undo_error(Some(ActivityError::non_retryable("LedgerLocked", "locked")));

    let err = harness
        .spawn(params(ExecutionScenario::InvalidAccount))
        .await
        .unwrap()
        .unwrap_err();

    match err {
        TransferError::Activity(failure) => {
            assert_eq!(failure.activity, ActivityKind::UndoWithdraw);
            assert_eq!(failure.original_message(), "locked");
        }
        other => panic!("expected undo failure, got {other:?}"),
    }
    assert_eq!(harness.accounts.undo_count(), 1);
}

// ========================================================================
// Isolation Tests
// ========================================================================

#[tokio::test(start_paused = true)]
async fn test_instances_are_independent() {
    let approved = TestHarness::new();
    let abandoned = TestHarness::new();
    approved.accounts.set_validate_result(false);
    abandoned.accounts.set_validate_result(false);

    let approved_task = approved.spawn(params(ExecutionScenario::HumanInLoop));
    let abandoned_task = abandoned.spawn(params(ExecutionScenario::HumanInLoop));

    wait_for_state(&approved.handle(), TransferState::Waiting).await;
    wait_for_state(&abandoned.handle(), TransferState::Waiting).await;
    approved.handle().approve_transfer();

    assert!(approved_task.await.unwrap().is_ok());
    assert!(matches!(
        abandoned_task.await.unwrap(),
        Err(TransferError::ApprovalTimeout { .. })
    ));
    assert!(!abandoned.handle().is_approved());
}
