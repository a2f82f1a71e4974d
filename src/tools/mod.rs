//! Tool system
//!
//! This module provides:
//! - `Tool` trait - Interface for implementing tools
//! - `ToolResult` / `ToolError` - Result types for tool execution
//! - `ToolKind` - Capability kind driving policy-mode auto-approval
//! - `ToolRegistry` - Registry with indexing, observers, and isolated copies

mod registry;
mod tool;

#[cfg(test)]
pub(crate) mod test_support;

pub use registry::{RegistryObserver, ToolRegistry};
pub use tool::{
    ProgressFn, ResultMetadata, Tool, ToolError, ToolErrorKind, ToolKind, ToolResult,
};
