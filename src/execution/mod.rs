//! Execution: the saga orchestrator and its supporting state.

pub mod orchestrator;
pub mod registry;
pub mod state;

pub use orchestrator::{ExecutionSettings, Orchestrator};
pub use registry::{ExecutionKey, ExecutionSlots, SlotGuard};
pub use state::{CompensationRecord, Execution, ExecutionState, FailureReason};
