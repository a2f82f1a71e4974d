//! Staged tool execution
//!
//! The pipeline is the only path by which a tool runs: Discovery resolves
//! and validates, Permission gates on policy and path safety, Confirmation
//! suspends on the UI when required, Execution runs the body under path
//! locks, and Formatting stamps metadata on the result.

pub mod confirmation;
pub mod execution;
#[allow(clippy::module_inception)]
pub mod pipeline;

pub use confirmation::{
    ApprovalScope, ConfirmationDetails, ConfirmationHandler, ConfirmationOutcome,
};
pub use execution::ToolExecution;
pub use pipeline::{ExecutionPipeline, ToolCall};
