//! Durable Runtime Primitives
//!
//! The orchestrator never calls the clock, the UUID generator or the
//! visibility store directly. Everything that must be replay-safe goes
//! through [`DurableRuntime`], so an engine with persistence and replay
//! can be slotted in without touching the orchestration logic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Notify;
use tracing::info;
use uuid::Uuid;

use super::types::TransferId;

/// Checkpoint key published when enhanced observability is requested
pub const WORKFLOW_STEP: &str = "Step";

/// Suspension, id generation and visibility facilities
#[async_trait]
pub trait DurableRuntime: Send + Sync {
    /// Suspend the calling orchestration for `duration`.
    ///
    /// Also the clock that bounds each activity attempt.
    async fn sleep(&self, duration: Duration);

    /// Suspend until `condition` holds or `timeout` elapses.
    ///
    /// `wake` is notified whenever state the condition reads may have
    /// changed. Returns `true` if the condition held, `false` on timeout.
    async fn await_condition(
        &self,
        timeout: Duration,
        wake: &Notify,
        condition: &(dyn Fn() -> bool + Send + Sync),
    ) -> bool;

    /// UUID that stays stable when the same logical step is replayed
    fn random_uuid(&self) -> Uuid;

    /// Publish a step label for external observers
    fn publish_checkpoint(&self, transfer_id: &TransferId, step: &str);
}

enum IdSource {
    Random,
    Sequential(AtomicU64),
}

/// In-process runtime backed by tokio timers
///
/// Suspension is real (tokio timers), so a paused test clock drives it
/// deterministically. No persistence: a crashed process loses its instances.
pub struct TokioRuntime {
    ids: IdSource,
    checkpoints: DashMap<TransferId, Vec<String>>,
}

impl TokioRuntime {
    pub fn new() -> Self {
        Self {
            ids: IdSource::Random,
            checkpoints: DashMap::new(),
        }
    }

    /// Runtime whose UUIDs are a counter (1, 2, 3, ...) for reproducible runs
    pub fn with_sequential_ids() -> Self {
        Self {
            ids: IdSource::Sequential(AtomicU64::new(0)),
            checkpoints: DashMap::new(),
        }
    }

    /// Checkpoints published by one transfer, oldest first
    pub fn checkpoints(&self, transfer_id: &TransferId) -> Vec<String> {
        self.checkpoints
            .get(transfer_id)
            .map(|steps| steps.value().clone())
            .unwrap_or_default()
    }

    /// Latest checkpoint published by one transfer
    pub fn current_step(&self, transfer_id: &TransferId) -> Option<String> {
        self.checkpoints
            .get(transfer_id)
            .and_then(|steps| steps.value().last().cloned())
    }
}

impl Default for TokioRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DurableRuntime for TokioRuntime {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn await_condition(
        &self,
        timeout: Duration,
        wake: &Notify,
        condition: &(dyn Fn() -> bool + Send + Sync),
    ) -> bool {
        let wait = async {
            loop {
                let notified = wake.notified();
                tokio::pin!(notified);
                // Register before checking so a wake between check and await is not lost
                notified.as_mut().enable();
                if condition() {
                    return;
                }
                notified.await;
            }
        };

        tokio::time::timeout(timeout, wait).await.is_ok()
    }

    fn random_uuid(&self) -> Uuid {
        match &self.ids {
            IdSource::Random => Uuid::new_v4(),
            IdSource::Sequential(counter) => {
                Uuid::from_u128(u128::from(counter.fetch_add(1, Ordering::SeqCst) + 1))
            }
        }
    }

    fn publish_checkpoint(&self, transfer_id: &TransferId, step: &str) {
        info!(transfer_id = %transfer_id, key = WORKFLOW_STEP, step, "Checkpoint published");
        self.checkpoints
            .entry(*transfer_id)
            .or_default()
            .push(step.to_string());
    }
}
