//! Money Transfer Orchestration
//!
//! Durable multi-step transfer between two accounts, with an optional human
//! approval and compensation of the withdraw when the deposit fails.
//!
//! # Phases
//!
//! ```text
//! STARTING ─settle─→ RUNNING ─validate─┬─ ok ──────────────────→ RUNNING ─withdraw─deposit─→ FINISHED
//!                                      └─ declined → WAITING ─approved─┘
//!                                                       └─timeout→ ApprovalTimeout
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Exactly-once deposit**: every deposit attempt carries the same idempotency key
//! 2. **At most one approval**: the approval flag is set once; a second update is rejected
//! 3. **Compensate deposit only**: undoWithdraw runs only after a terminal deposit failure
//! 4. **Replay-safe suspension**: timers, waits and ids come from [`DurableRuntime`]

pub mod activities;
pub mod adapters;
pub mod coordinator;
pub mod error;
pub mod retry;
pub mod runtime;
pub mod state;
pub mod status;
pub mod types;
pub mod workflow;

#[cfg(test)]
mod integration_tests;

// Re-exports for convenience
pub use activities::ActivityStub;
pub use adapters::{AccountOperations, SimulatedLedger};
pub use coordinator::TransferCoordinator;
pub use error::{ActivityError, ActivityFailure, ActivityKind, TransferError};
pub use retry::{ActivityOptions, RetryPolicy};
pub use runtime::{DurableRuntime, TokioRuntime};
pub use state::TransferState;
pub use status::{StateSnapshot, TransferStatus};
pub use types::{ChargeResult, ExecutionScenario, TransferId, TransferParameters};
pub use workflow::{TransferHandle, TransferOrchestrator};
