//! Execution pipeline
//!
//! Every tool call flows through five stages in order: Discovery,
//! Permission, Confirmation, Execution, Formatting. A stage may abort the
//! execution with a classified error, and every later stage then becomes a
//! no-op. Tools never run outside this pipeline.

use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::core::ExecutionContext;
use crate::locks::FileLockManager;
use crate::permissions::{
    safety, Decision, PermissionCheckResult, PermissionChecker, Sensitivity, ToolInvocation,
};
use crate::tools::{ProgressFn, ResultMetadata, ToolErrorKind, ToolRegistry, ToolResult};

use super::confirmation::{ApprovalScope, ConfirmationDetails, ConfirmationHandler};
use super::execution::ToolExecution;

/// One entry of a tool-call chain
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub tool_name: String,
    pub params: Value,
}

impl ToolCall {
    pub fn new(tool_name: impl Into<String>, params: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            params,
        }
    }
}

/// The staged tool execution pipeline
pub struct ExecutionPipeline {
    registry: Arc<RwLock<ToolRegistry>>,
    checker: Arc<PermissionChecker>,
    locks: Arc<FileLockManager>,
    confirmation: Option<Arc<dyn ConfirmationHandler>>,
    on_progress: Option<ProgressFn>,
}

impl ExecutionPipeline {
    /// Create a pipeline over a registry, checker, and lock manager
    pub fn new(
        registry: Arc<RwLock<ToolRegistry>>,
        checker: Arc<PermissionChecker>,
        locks: Arc<FileLockManager>,
    ) -> Self {
        Self {
            registry,
            checker,
            locks,
            confirmation: None,
            on_progress: None,
        }
    }

    /// Attach the UI confirmation handler
    pub fn with_confirmation_handler(mut self, handler: Arc<dyn ConfirmationHandler>) -> Self {
        self.confirmation = Some(handler);
        self
    }

    /// Attach a progress callback forwarded to long-running tools
    pub fn with_progress(mut self, on_progress: ProgressFn) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// The permission checker backing this pipeline
    pub fn checker(&self) -> &Arc<PermissionChecker> {
        &self.checker
    }

    /// The tool registry backing this pipeline
    pub fn registry(&self) -> &Arc<RwLock<ToolRegistry>> {
        &self.registry
    }

    /// Execute one tool call through all five stages.
    ///
    /// Never panics and never returns early without a result: every failure
    /// mode lands as a failed `ToolResult` with a classified error.
    pub async fn execute(
        &self,
        tool_name: &str,
        params: Value,
        context: ExecutionContext,
    ) -> ToolResult {
        let mut exec = ToolExecution::new(tool_name, params, context);
        tracing::debug!("[Pipeline] {} execution {} started", exec.tool_name, exec.id);

        self.discovery(&mut exec);
        self.permission(&mut exec);
        self.confirm(&mut exec).await;
        self.run(&mut exec).await;
        self.format(&mut exec);

        exec.into_result()
    }

    /// Execute a chain of calls sequentially, in order
    pub async fn execute_chain(
        &self,
        calls: Vec<ToolCall>,
        context: &ExecutionContext,
    ) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(
                self.execute(&call.tool_name, call.params, context.clone())
                    .await,
            );
        }
        results
    }

    /// Execute a chain of calls concurrently.
    ///
    /// Path locks still serialize mutating calls that touch the same file, so
    /// this is safe for mixed read/write chains.
    pub async fn execute_chain_parallel(
        &self,
        calls: Vec<ToolCall>,
        context: &ExecutionContext,
    ) -> Vec<ToolResult> {
        let futures = calls
            .into_iter()
            .map(|call| self.execute_call(call, context.clone()));
        futures::future::join_all(futures).await
    }

    async fn execute_call(&self, call: ToolCall, context: ExecutionContext) -> ToolResult {
        self.execute(&call.tool_name, call.params, context).await
    }

    /// Discovery: resolve the tool and validate the parameter shape
    fn discovery(&self, exec: &mut ToolExecution) {
        if exec.is_aborted() {
            return;
        }

        let tool = match self.registry.read().unwrap().get(&exec.tool_name) {
            Some(tool) => tool,
            None => {
                exec.abort(
                    ToolErrorKind::NotFound,
                    format!("Tool not found: {}", exec.tool_name),
                );
                return;
            }
        };

        if let Err(e) = tool.validate_params(&exec.params) {
            exec.abort(
                ToolErrorKind::InvalidParams,
                format!("Invalid parameters for {}: {}", exec.tool_name, e),
            );
            return;
        }

        exec.tool = Some(tool);
    }

    /// Permission: build the invocation descriptor and resolve it against the
    /// safety layer and the policy checker
    fn permission(&self, exec: &mut ToolExecution) {
        if exec.is_aborted() {
            return;
        }
        let Some(tool) = exec.tool.clone() else {
            return;
        };

        let invocation = ToolInvocation::from_tool(tool.as_ref(), exec.params.clone());

        // Safety denials are not policy-overridable
        if let Some(violation) = safety::check_paths(&invocation.affected_paths) {
            exec.invocation = Some(invocation);
            exec.abort(
                ToolErrorKind::PolicyDenied,
                format!("Blocked unsafe path {}: {}", violation.path, violation.reason),
            );
            return;
        }

        let mut result = self.checker.check(&invocation);

        match safety::classify_paths(&invocation.affected_paths) {
            Sensitivity::High if !result.is_explicit_allow() => {
                if result.decision != Decision::Deny {
                    result = PermissionCheckResult {
                        decision: Decision::Deny,
                        matched_rule: None,
                        match_type: None,
                        reason: "high-sensitivity path requires an explicit allow rule"
                            .to_string(),
                    };
                }
            }
            Sensitivity::Medium => {
                exec.needs_confirmation = true;
                exec.confirmation_reason = Some("touches a sensitive file".to_string());
            }
            _ => {}
        }

        match result.decision {
            Decision::Deny => {
                let reason = result.reason.clone();
                exec.invocation = Some(invocation);
                exec.check_result = Some(result);
                exec.abort(
                    ToolErrorKind::PolicyDenied,
                    format!("Permission denied: {}", reason),
                );
            }
            Decision::Ask => {
                exec.needs_confirmation = true;
                if exec.confirmation_reason.is_none() {
                    exec.confirmation_reason = Some(result.reason.clone());
                }
                exec.invocation = Some(invocation);
                exec.check_result = Some(result);
            }
            Decision::Allow => {
                exec.invocation = Some(invocation);
                exec.check_result = Some(result);
            }
        }
    }

    /// Confirmation: suspend on the handler when the Permission stage asked
    /// for one
    async fn confirm(&self, exec: &mut ToolExecution) {
        if exec.is_aborted() || !exec.needs_confirmation {
            return;
        }

        if exec.context.is_cancelled() {
            exec.abort(ToolErrorKind::Cancelled, "aborted before confirmation");
            return;
        }

        let Some(handler) = self.confirmation.clone() else {
            tracing::warn!(
                "[Pipeline] No confirmation handler attached; auto-approving {}",
                exec.tool_name
            );
            return;
        };

        let details = build_details(exec);
        let cancel = exec.context.cancellation_token();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                exec.abort(ToolErrorKind::Cancelled, "aborted while awaiting confirmation");
                return;
            }
            outcome = handler.request_confirmation(details) => outcome,
        };

        if !outcome.approved {
            let reason = outcome
                .reason
                .unwrap_or_else(|| "declined by user".to_string());
            exec.abort(
                ToolErrorKind::UserDenied,
                format!("User denied permission: {}", reason),
            );
            return;
        }

        if outcome.scope == ApprovalScope::Session {
            if let (Some(invocation), Some(tool)) = (exec.invocation.as_ref(), exec.tool.as_ref())
            {
                self.checker.remember_for_session(invocation.signature.clone());
                let pattern = self
                    .checker
                    .abstract_pattern(invocation, tool.abstract_permission_rule(&exec.params));
                if let Err(e) = self.checker.persist_allow_pattern(&pattern) {
                    tracing::warn!(
                        "[Pipeline] Failed to persist allow pattern '{}': {}",
                        pattern,
                        e
                    );
                }
            }
        }
    }

    /// Execution: invoke the tool body, serializing on path locks for
    /// mutating tools
    async fn run(&self, exec: &mut ToolExecution) {
        if exec.is_aborted() {
            return;
        }

        if exec.context.is_cancelled() {
            exec.abort(ToolErrorKind::Cancelled, "aborted before execution");
            return;
        }

        let Some(tool) = exec.tool.clone() else {
            return;
        };
        let paths: Vec<String> = exec
            .invocation
            .as_ref()
            .map(|inv| inv.affected_paths.clone())
            .unwrap_or_default();
        let serialize = !tool.kind().is_read_only() && !paths.is_empty();

        let signal = exec.context.cancellation_token();
        let progress = self.on_progress.clone();
        let params = exec.params.clone();

        let body = async {
            if serialize {
                self.locks
                    .acquire_locks(&paths, tool.execute(&params, signal.clone(), progress))
                    .await
            } else {
                tool.execute(&params, signal.clone(), progress).await
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = signal.cancelled() => {
                exec.abort(ToolErrorKind::Cancelled, "aborted during execution");
                return;
            }
            outcome = body => outcome,
        };

        match outcome {
            Ok(result) => exec.set_result(result),
            Err(e) => exec.set_result(ToolResult::failure(
                ToolErrorKind::ExecutionError,
                format!("Tool execution failed: {}", e),
            )),
        }
    }

    /// Formatting: normalize content fields and stamp metadata.
    ///
    /// Skipped for aborted executions, whose classified error is already the
    /// final result.
    fn format(&self, exec: &mut ToolExecution) {
        if exec.is_aborted() {
            return;
        }

        let mut result = exec.take_result().unwrap_or_else(|| {
            ToolResult::failure(ToolErrorKind::ExecutionError, "execution produced no result")
        });

        if result.llm_content.is_empty() {
            result.llm_content = if result.display_content.is_empty() {
                "(no output)".to_string()
            } else {
                result.display_content.clone()
            };
        }
        if result.display_content.is_empty() {
            result.display_content = result.llm_content.clone();
        }

        result.metadata = Some(ResultMetadata {
            tool_name: exec.tool_name.clone(),
            session_id: exec.context.session_id.clone(),
            execution_id: exec.id.clone(),
            timestamp: chrono::Utc::now(),
            duration_ms: exec.started.elapsed().as_millis() as u64,
        });

        exec.put_result(result);
    }
}

fn build_details(exec: &ToolExecution) -> ConfirmationDetails {
    let mut risks = Vec::new();
    if let Some(invocation) = exec.invocation.as_ref() {
        if let Some(risk) = invocation.kind.risk_description() {
            risks.push(risk.to_string());
        }
        if safety::classify_paths(&invocation.affected_paths) >= Sensitivity::Medium {
            risks.push("Touches a sensitive file".to_string());
        }
    }

    ConfirmationDetails {
        title: format!("Allow {}?", exec.tool_name),
        message: exec
            .confirmation_reason
            .clone()
            .unwrap_or_else(|| format!("Tool '{}' requests approval", exec.tool_name)),
        risks,
        affected_paths: exec
            .invocation
            .as_ref()
            .map(|inv| inv.affected_paths.clone())
            .unwrap_or_default(),
    }
}
