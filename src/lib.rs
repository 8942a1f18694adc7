//! Money Transfer - durable transfer orchestration
//!
//! Moves an amount between two accounts through a ledger, surviving slow
//! approvals and partial failures.
//!
//! # Modules
//!
//! - [`transfer`] - Orchestration state machine, control surface, ledger adapters
//! - [`config`] - YAML application and workflow configuration
//! - [`logging`] - tracing subscriber setup

pub mod config;
pub mod logging;
pub mod transfer;

// Convenient re-exports at crate root
pub use config::{AppConfig, WorkflowConfig};
pub use transfer::{
    AccountOperations, ChargeResult, ExecutionScenario, SimulatedLedger, StateSnapshot,
    TokioRuntime, TransferCoordinator, TransferError, TransferHandle, TransferId,
    TransferOrchestrator, TransferParameters, TransferState,
};
