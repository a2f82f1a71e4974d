//! Per-call execution state
//!
//! One `ToolExecution` is created per tool call, flows through the pipeline
//! stages, and is consumed for its final result. Only stages write the
//! internal fields; once aborted, no later stage may override the result.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::core::ExecutionContext;
use crate::permissions::{PermissionCheckResult, ToolInvocation};
use crate::tools::{Tool, ToolErrorKind, ToolResult};

/// Mutable state machine for one tool call
pub struct ToolExecution {
    /// Unique execution ID
    pub id: String,
    pub tool_name: String,
    pub params: Value,
    pub context: ExecutionContext,

    // Internal stage state
    pub(crate) tool: Option<Arc<dyn Tool>>,
    pub(crate) invocation: Option<ToolInvocation>,
    pub(crate) check_result: Option<PermissionCheckResult>,
    pub(crate) needs_confirmation: bool,
    pub(crate) confirmation_reason: Option<String>,
    pub(crate) started: Instant,

    aborted: bool,
    result: Option<ToolResult>,
}

impl ToolExecution {
    /// Create a fresh execution for one call
    pub fn new(tool_name: impl Into<String>, params: Value, context: ExecutionContext) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tool_name: tool_name.into(),
            params,
            context,
            tool: None,
            invocation: None,
            check_result: None,
            needs_confirmation: false,
            confirmation_reason: None,
            started: Instant::now(),
            aborted: false,
            result: None,
        }
    }

    /// Terminally abort this execution.
    ///
    /// Sets a failed result and prevents every later stage from running or
    /// overriding it. The first abort wins.
    pub fn abort(&mut self, kind: ToolErrorKind, message: impl Into<String>) {
        if self.aborted {
            return;
        }
        let message = message.into();
        tracing::info!(
            "[Pipeline] Aborting execution of {}: {}",
            self.tool_name,
            message
        );
        self.aborted = true;
        self.result = Some(ToolResult::failure(kind, message));
    }

    /// Whether a stage has aborted this execution
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// The permission signature, once the Permission stage has run
    pub fn signature(&self) -> Option<&str> {
        self.invocation.as_ref().map(|inv| inv.signature.as_str())
    }

    /// The permission check result, once the Permission stage has run
    pub fn check_result(&self) -> Option<&PermissionCheckResult> {
        self.check_result.as_ref()
    }

    /// Set the execution result; ignored after an abort
    pub(crate) fn set_result(&mut self, result: ToolResult) {
        if !self.aborted {
            self.result = Some(result);
        }
    }

    pub(crate) fn take_result(&mut self) -> Option<ToolResult> {
        self.result.take()
    }

    pub(crate) fn put_result(&mut self, result: ToolResult) {
        self.result = Some(result);
    }

    /// Consume the execution and produce its final result
    pub fn into_result(self) -> ToolResult {
        self.result.unwrap_or_else(|| {
            ToolResult::failure(
                ToolErrorKind::ExecutionError,
                "execution produced no result",
            )
        })
    }
}
