//! Delegated task execution
//!
//! A subagent is a bounded agentic loop with its own system prompt, an
//! isolated copy of the parent's tool registry, and an injected completion
//! tool for structured output.

pub mod definition;
pub mod executor;

pub use definition::{SubagentDefinition, SubagentRegistry, DEFAULT_MAX_TURNS};
pub use executor::{
    Activity, ActivityFn, ActivityKind, SubagentExecutor, SubagentOptions, SubagentResult,
    TerminateReason, COMPLETION_TOOL,
};
