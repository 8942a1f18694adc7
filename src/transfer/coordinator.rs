//! Transfer Coordinator
//!
//! Starts orchestration instances on tokio tasks and keeps them addressable
//! by [`TransferId`]. At most one live instance exists per ID. An instance
//! is retired from the registry once its outcome has been handed out;
//! callers that still hold a [`TransferHandle`] can keep querying it.

use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::adapters::AccountOperations;
use super::error::TransferError;
use super::runtime::DurableRuntime;
use super::types::{ChargeResult, TransferId, TransferParameters};
use super::workflow::{TransferHandle, TransferOrchestrator};
use crate::config::WorkflowConfig;

type TransferTask = JoinHandle<Result<ChargeResult, TransferError>>;

struct RunningTransfer {
    handle: TransferHandle,
    /// Taken by the first caller awaiting the outcome
    task: Mutex<Option<TransferTask>>,
}

/// Transfer Coordinator - registry of orchestration instances
pub struct TransferCoordinator {
    accounts: Arc<dyn AccountOperations>,
    runtime: Arc<dyn DurableRuntime>,
    config: WorkflowConfig,
    instances: DashMap<TransferId, RunningTransfer>,
}

impl TransferCoordinator {
    /// Create a new TransferCoordinator
    pub fn new(
        accounts: Arc<dyn AccountOperations>,
        runtime: Arc<dyn DurableRuntime>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            accounts,
            runtime,
            config,
            instances: DashMap::new(),
        }
    }

    /// Start a transfer under a freshly generated ID
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, params: TransferParameters) -> Result<TransferHandle, TransferError> {
        self.start_with_id(TransferId::new(), params)
    }

    /// Start a transfer under a caller-chosen ID
    ///
    /// Parameters are validated before the instance is registered, so a
    /// rejected request leaves no trace.
    pub fn start_with_id(
        &self,
        transfer_id: TransferId,
        params: TransferParameters,
    ) -> Result<TransferHandle, TransferError> {
        params.validate()?;

        match self.instances.entry(transfer_id) {
            Entry::Occupied(_) => {
                debug!(transfer_id = %transfer_id, "Duplicate transfer start rejected");
                Err(TransferError::DuplicateTransfer(transfer_id.to_string()))
            }
            Entry::Vacant(slot) => {
                let orchestrator = TransferOrchestrator::new(
                    transfer_id,
                    self.accounts.clone(),
                    self.runtime.clone(),
                    self.config.clone(),
                );
                let handle = orchestrator.handle();
                let task = tokio::spawn(async move { orchestrator.transfer(&params).await });

                slot.insert(RunningTransfer {
                    handle: handle.clone(),
                    task: Mutex::new(Some(task)),
                });
                info!(transfer_id = %transfer_id, "Transfer instance started");
                Ok(handle)
            }
        }
    }

    /// Control handle of a known transfer
    pub fn handle(&self, transfer_id: &TransferId) -> Option<TransferHandle> {
        self.instances
            .get(transfer_id)
            .map(|entry| entry.value().handle.clone())
    }

    /// Wait for the terminal outcome of a transfer and retire the instance
    ///
    /// The outcome is handed out once; later calls report `TransferNotFound`.
    pub async fn wait_for(&self, transfer_id: &TransferId) -> Result<ChargeResult, TransferError> {
        let not_found = || TransferError::TransferNotFound(transfer_id.to_string());

        // Release the map entry before suspending
        let task = {
            let entry = self.instances.get(transfer_id).ok_or_else(not_found)?;
            let mut slot = entry
                .value()
                .task
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            slot.take()
        }
        .ok_or_else(not_found)?;

        let outcome = task.await;
        self.instances.remove(transfer_id);
        debug!(transfer_id = %transfer_id, "Transfer instance retired");
        outcome?
    }

    /// Number of registered instances whose outcome has not been collected
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
