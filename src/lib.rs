//! Palisade: permission-gated tool execution for agentic assistants.
//!
//! The crate centers on a staged execution pipeline: every tool call is
//! resolved, checked against a layered permission policy, confirmed with the
//! user when required, executed under per-path locks, and formatted with
//! metadata. Around it sit the tool registry, the durable policy store with
//! hot reload, and a bounded subagent executor for delegated tasks.

pub mod core;
pub mod llm;
pub mod locks;
pub mod logging;
pub mod permissions;
pub mod pipeline;
pub mod subagent;
pub mod tools;

pub use crate::core::{AgentError, AgentResult, ExecutionContext};
pub use locks::FileLockManager;
pub use permissions::{Decision, PermissionChecker, PolicyMode, PolicyStore};
pub use pipeline::{ConfirmationHandler, ExecutionPipeline, ToolCall};
pub use subagent::{SubagentDefinition, SubagentExecutor, SubagentRegistry, TerminateReason};
pub use tools::{Tool, ToolRegistry, ToolResult};
