//! Core types for the gating core
//!
//! This module provides the fundamental types used throughout the crate:
//! - `ExecutionContext` - Session identity and abort signal passed to tools
//! - `AgentError` - Error types

pub mod context;
pub mod error;

pub use context::ExecutionContext;
pub use error::{AgentError, AgentResult};
