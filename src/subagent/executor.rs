//! Subagent executor
//!
//! Runs a delegated task in a bounded agentic loop with its own isolated
//! tool registry. The loop ends on goal completion (the injected
//! `complete_subagent_task` tool), the turn cap, the token budget, the
//! parent's abort signal, or a provider error. Structured output is only
//! returned for goal completion.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::core::ExecutionContext;
use crate::llm::{
    ContentBlock, Message, ModelProvider, TokenUsage, ToolDefinition, ToolInputSchema,
};
use crate::locks::FileLockManager;
use crate::permissions::PermissionChecker;
use crate::pipeline::{ConfirmationHandler, ExecutionPipeline};
use crate::tools::{ProgressFn, Tool, ToolKind, ToolRegistry, ToolResult};

use super::definition::SubagentDefinition;

/// Name of the injected completion tool
pub const COMPLETION_TOOL: &str = "complete_subagent_task";

/// Activity log cap; the oldest entries are evicted past this
const MAX_ACTIVITY_ENTRIES: usize = 1000;

/// Why a subagent run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminateReason {
    /// The subagent called the completion tool
    Goal,
    /// The turn cap was reached
    MaxTurns,
    /// The token budget was exhausted
    TokenLimit,
    /// The parent's abort signal fired
    Aborted,
    /// The model provider failed
    Error,
}

/// What kind of event an activity entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    ModelResponse,
    ToolCall,
    ToolResult,
}

/// One entry of the subagent activity log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub timestamp: DateTime<Utc>,
    pub turn: usize,
    pub kind: ActivityKind,
    pub summary: String,
}

/// Callback invoked for every activity entry as it is recorded
pub type ActivityFn = Arc<dyn Fn(&Activity) + Send + Sync>;

/// Per-run options
#[derive(Default)]
pub struct SubagentOptions {
    /// Abort signal from the parent; cancelling it ends the run
    pub cancel: CancellationToken,
    /// Observer for activity entries
    pub on_activity: Option<ActivityFn>,
}

/// Outcome of one subagent run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubagentResult {
    /// Structured output; `Some` only when the run ended with `Goal`
    pub output: Option<Value>,
    pub terminate_reason: TerminateReason,
    pub turns: usize,
    pub duration_ms: u64,
    pub token_usage: TokenUsage,
    pub activities: Vec<Activity>,
    /// Provider error message when the run ended with `Error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Injected tool the subagent calls to finish its task
struct CompleteTaskTool {
    output: Arc<Mutex<Option<Value>>>,
}

#[async_trait]
impl Tool for CompleteTaskTool {
    fn name(&self) -> &str {
        COMPLETION_TOOL
    }

    fn description(&self) -> &str {
        "Mark the delegated task as complete and return its structured output"
    }

    // Read-only so every policy mode auto-approves completion
    fn kind(&self) -> ToolKind {
        ToolKind::ReadOnly
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: COMPLETION_TOOL.to_string(),
            description: Some(self.description().to_string()),
            input_schema: ToolInputSchema::object(
                json!({
                    "output": {
                        "type": "object",
                        "description": "Structured result of the task"
                    }
                }),
                Vec::new(),
            ),
        }
    }

    async fn execute(
        &self,
        params: &Value,
        _signal: CancellationToken,
        _on_progress: Option<ProgressFn>,
    ) -> Result<ToolResult> {
        let output = params.get("output").cloned().unwrap_or_else(|| params.clone());
        *self.output.lock().unwrap() = Some(output);
        Ok(ToolResult::success("Task marked complete"))
    }
}

/// Executes one subagent definition over an isolated tool registry
pub struct SubagentExecutor {
    definition: Arc<SubagentDefinition>,
    provider: Arc<dyn ModelProvider>,
    parent_registry: Arc<RwLock<ToolRegistry>>,
    checker: Arc<PermissionChecker>,
    locks: Arc<FileLockManager>,
    confirmation: Option<Arc<dyn ConfirmationHandler>>,
}

impl SubagentExecutor {
    /// Create an executor sharing the parent's checker and lock manager
    pub fn new(
        definition: Arc<SubagentDefinition>,
        provider: Arc<dyn ModelProvider>,
        parent_registry: Arc<RwLock<ToolRegistry>>,
        checker: Arc<PermissionChecker>,
        locks: Arc<FileLockManager>,
    ) -> Self {
        Self {
            definition,
            provider,
            parent_registry,
            checker,
            locks,
            confirmation: None,
        }
    }

    /// Attach the UI confirmation handler for the subagent's tool calls
    pub fn with_confirmation_handler(mut self, handler: Arc<dyn ConfirmationHandler>) -> Self {
        self.confirmation = Some(handler);
        self
    }

    /// Run the subagent to termination.
    ///
    /// The tool registry is an isolated copy taken at the start of the run;
    /// parent registry changes made afterwards are not visible inside it.
    pub async fn execute(&self, params: Value, options: SubagentOptions) -> SubagentResult {
        let started = Instant::now();
        tracing::info!(
            "[Subagent] Starting '{}' (max_turns={}, budget={:?})",
            self.definition.name,
            self.definition.max_turns,
            self.definition.token_budget
        );

        let output_slot: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));

        let mut registry = self
            .parent_registry
            .read()
            .unwrap()
            .isolated_copy(self.definition.allowed_tools.as_deref());
        registry.register(CompleteTaskTool {
            output: output_slot.clone(),
        });
        let registry = Arc::new(RwLock::new(registry));

        let mut pipeline = ExecutionPipeline::new(
            registry.clone(),
            self.checker.clone(),
            self.locks.clone(),
        );
        if let Some(handler) = self.confirmation.clone() {
            pipeline = pipeline.with_confirmation_handler(handler);
        }

        let context = ExecutionContext::new().with_cancellation(options.cancel.clone());
        let tool_definitions = registry.read().unwrap().definitions();

        let task_text = serde_json::to_string_pretty(&params)
            .unwrap_or_else(|_| params.to_string());
        let mut messages = vec![Message::user(format!("Task input:\n{}", task_text))];

        let mut usage = TokenUsage::default();
        let mut activities: Vec<Activity> = Vec::new();
        let mut turns = 0usize;
        let mut error: Option<String> = None;

        let reason = loop {
            if options.cancel.is_cancelled() {
                break TerminateReason::Aborted;
            }
            if turns >= self.definition.max_turns {
                break TerminateReason::MaxTurns;
            }
            turns += 1;

            let response = tokio::select! {
                biased;
                _ = options.cancel.cancelled() => break TerminateReason::Aborted,
                response = self.provider.complete(
                    messages.clone(),
                    Some(&self.definition.system_prompt),
                    tool_definitions.clone(),
                ) => response,
            };
            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    error = Some(e.to_string());
                    break TerminateReason::Error;
                }
            };

            usage.add(response.input_tokens, response.output_tokens);
            record(
                &mut activities,
                &options.on_activity,
                turns,
                ActivityKind::ModelResponse,
                summarize_response(&response.content),
            );

            if let Some(budget) = self.definition.token_budget {
                if usage.exceeds(budget) {
                    break TerminateReason::TokenLimit;
                }
            }

            let tool_uses: Vec<(String, String, Value)> = response
                .content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolUse { id, name, input } => {
                        Some((id.clone(), name.clone(), input.clone()))
                    }
                    _ => None,
                })
                .collect();

            messages.push(Message::assistant_with_blocks(response.content));

            if tool_uses.is_empty() {
                // Nudge the model toward explicit completion
                messages.push(Message::user(format!(
                    "Continue. Call {} when the task is done.",
                    COMPLETION_TOOL
                )));
                continue;
            }

            let mut result_blocks = Vec::with_capacity(tool_uses.len());
            for (id, name, input) in tool_uses {
                record(
                    &mut activities,
                    &options.on_activity,
                    turns,
                    ActivityKind::ToolCall,
                    format!("{} called", name),
                );

                let result = pipeline.execute(&name, input, context.clone()).await;
                record(
                    &mut activities,
                    &options.on_activity,
                    turns,
                    ActivityKind::ToolResult,
                    format!(
                        "{} {}",
                        name,
                        if result.success { "succeeded" } else { "failed" }
                    ),
                );

                result_blocks.push(ContentBlock::tool_result(
                    id,
                    result.llm_content.clone(),
                    !result.success,
                ));
            }
            messages.push(Message::user_with_blocks(result_blocks));

            if output_slot.lock().unwrap().is_some() {
                break TerminateReason::Goal;
            }
        };

        let output = if reason == TerminateReason::Goal {
            output_slot.lock().unwrap().take()
        } else {
            None
        };

        tracing::info!(
            "[Subagent] '{}' finished: {:?} after {} turn(s), {} tokens",
            self.definition.name,
            reason,
            turns,
            usage.total
        );

        SubagentResult {
            output,
            terminate_reason: reason,
            turns,
            duration_ms: started.elapsed().as_millis() as u64,
            token_usage: usage,
            activities,
            error,
        }
    }
}

fn record(
    activities: &mut Vec<Activity>,
    on_activity: &Option<ActivityFn>,
    turn: usize,
    kind: ActivityKind,
    summary: String,
) {
    let activity = Activity {
        timestamp: Utc::now(),
        turn,
        kind,
        summary,
    };
    if let Some(callback) = on_activity {
        callback(&activity);
    }
    if activities.len() >= MAX_ACTIVITY_ENTRIES {
        activities.remove(0);
    }
    activities.push(activity);
}

fn summarize_response(content: &[ContentBlock]) -> String {
    let tool_calls = content
        .iter()
        .filter(|b| matches!(b, ContentBlock::ToolUse { .. }))
        .count();
    let text = content.iter().find_map(|b| match b {
        ContentBlock::Text { text } => Some(text.as_str()),
        _ => None,
    });
    match (text, tool_calls) {
        (Some(text), 0) => truncate(text, 120),
        (Some(text), n) => format!("{} (+{} tool call(s))", truncate(text, 120), n),
        (None, n) => format!("{} tool call(s)", n),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::llm::{ModelResponse, StopReason};
    use crate::permissions::{PermissionConfig, PolicyStore};
    use crate::tools::test_support::StubTool;

    /// Provider answering from a script; repeats the last response when the
    /// script runs out
    struct ScriptedProvider {
        responses: Mutex<Vec<ModelResponse>>,
        seen_tools: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<ModelResponse>) -> Self {
            Self {
                responses: Mutex::new(responses),
                seen_tools: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        async fn complete(
            &self,
            _messages: Vec<Message>,
            _system: Option<&str>,
            tools: Vec<ToolDefinition>,
        ) -> Result<ModelResponse> {
            self.seen_tools
                .lock()
                .unwrap()
                .push(tools.iter().map(|t| t.name.clone()).collect());

            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                Ok(responses.remove(0))
            } else {
                responses
                    .first()
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("script exhausted"))
            }
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl ModelProvider for FailingProvider {
        async fn complete(
            &self,
            _messages: Vec<Message>,
            _system: Option<&str>,
            _tools: Vec<ToolDefinition>,
        ) -> Result<ModelResponse> {
            Err(anyhow::anyhow!("connection reset"))
        }

        fn model(&self) -> &str {
            "failing"
        }
    }

    fn text_response(text: &str) -> ModelResponse {
        ModelResponse {
            content: vec![ContentBlock::text(text)],
            stop_reason: Some(StopReason::EndTurn),
            input_tokens: 10,
            output_tokens: 5,
        }
    }

    fn tool_use_response(name: &str, input: Value) -> ModelResponse {
        ModelResponse {
            content: vec![ContentBlock::ToolUse {
                id: "call-1".to_string(),
                name: name.to_string(),
                input,
            }],
            stop_reason: Some(StopReason::ToolUse),
            input_tokens: 10,
            output_tokens: 5,
        }
    }

    fn make_executor(
        definition: SubagentDefinition,
        provider: Arc<dyn ModelProvider>,
        parent_tools: Vec<StubTool>,
    ) -> SubagentExecutor {
        let mut registry = ToolRegistry::new();
        for tool in parent_tools {
            registry.register(tool);
        }
        let checker = Arc::new(PermissionChecker::new(Arc::new(PolicyStore::in_memory(
            PermissionConfig::default(),
        ))));
        SubagentExecutor::new(
            Arc::new(definition),
            provider,
            Arc::new(RwLock::new(registry)),
            checker,
            Arc::new(FileLockManager::new()),
        )
    }

    #[tokio::test]
    async fn test_goal_completion_returns_output() {
        let provider = Arc::new(ScriptedProvider::new(vec![tool_use_response(
            COMPLETION_TOOL,
            json!({"output": {"answer": 42}}),
        )]));
        let executor = make_executor(
            SubagentDefinition::new("solver", "solves", "You solve."),
            provider,
            vec![],
        );

        let result = executor.execute(json!({"question": "?"}), SubagentOptions::default()).await;
        assert_eq!(result.terminate_reason, TerminateReason::Goal);
        assert_eq!(result.output, Some(json!({"answer": 42})));
        assert_eq!(result.turns, 1);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_max_turns_without_completion() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("thinking...")]));
        let executor = make_executor(
            SubagentDefinition::new("stuck", "never finishes", "You stall.").with_max_turns(3),
            provider,
            vec![],
        );

        let result = executor.execute(json!({}), SubagentOptions::default()).await;
        assert_eq!(result.terminate_reason, TerminateReason::MaxTurns);
        assert_eq!(result.turns, 3);
        assert!(result.output.is_none());
    }

    #[tokio::test]
    async fn test_token_budget_suppresses_output() {
        // The completion call itself blows the budget; no output escapes
        let provider = Arc::new(ScriptedProvider::new(vec![ModelResponse {
            content: vec![ContentBlock::ToolUse {
                id: "call-1".to_string(),
                name: COMPLETION_TOOL.to_string(),
                input: json!({"output": {"answer": 42}}),
            }],
            stop_reason: Some(StopReason::ToolUse),
            input_tokens: 900,
            output_tokens: 200,
        }]));
        let executor = make_executor(
            SubagentDefinition::new("greedy", "spends", "You spend.").with_token_budget(1000),
            provider,
            vec![],
        );

        let result = executor.execute(json!({}), SubagentOptions::default()).await;
        assert_eq!(result.terminate_reason, TerminateReason::TokenLimit);
        assert!(result.output.is_none());
        assert_eq!(result.token_usage.total, 1100);
    }

    #[tokio::test]
    async fn test_registry_is_isolated_to_allowed_tools() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_use_response("Write", json!({})),
            tool_use_response(COMPLETION_TOOL, json!({"output": {}})),
        ]));
        let executor = make_executor(
            SubagentDefinition::new("reader", "reads", "You read.")
                .with_allowed_tools(["Read"]),
            provider.clone(),
            vec![
                StubTool::read_only("Read"),
                StubTool::new("Write", ToolKind::Edit),
            ],
        );

        let result = executor.execute(json!({}), SubagentOptions::default()).await;
        assert_eq!(result.terminate_reason, TerminateReason::Goal);

        // The model only ever saw the allowed set plus the completion tool
        let seen = provider.seen_tools.lock().unwrap();
        let mut first = seen[0].clone();
        first.sort();
        assert_eq!(first, vec!["Read".to_string(), COMPLETION_TOOL.to_string()]);

        // The disallowed tool resolved to a not-found error, not an execution
        let failed = result
            .activities
            .iter()
            .any(|a| a.kind == ActivityKind::ToolResult && a.summary == "Write failed");
        assert!(failed);
    }

    #[tokio::test]
    async fn test_pre_cancelled_aborts_without_turns() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("hi")]));
        let executor = make_executor(
            SubagentDefinition::new("doomed", "never runs", "You wait."),
            provider,
            vec![],
        );

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = executor
            .execute(
                json!({}),
                SubagentOptions {
                    cancel,
                    on_activity: None,
                },
            )
            .await;
        assert_eq!(result.terminate_reason, TerminateReason::Aborted);
        assert_eq!(result.turns, 0);
        assert!(result.output.is_none());
    }

    #[tokio::test]
    async fn test_provider_error_surfaces() {
        let executor = make_executor(
            SubagentDefinition::new("flaky", "errors", "You fail."),
            Arc::new(FailingProvider),
            vec![],
        );

        let result = executor.execute(json!({}), SubagentOptions::default()).await;
        assert_eq!(result.terminate_reason, TerminateReason::Error);
        assert_eq!(result.error.as_deref(), Some("connection reset"));
        assert!(result.output.is_none());
    }

    #[tokio::test]
    async fn test_activity_callback_fires() {
        let provider = Arc::new(ScriptedProvider::new(vec![tool_use_response(
            COMPLETION_TOOL,
            json!({"output": {}}),
        )]));
        let executor = make_executor(
            SubagentDefinition::new("watched", "observed", "You work."),
            provider,
            vec![],
        );

        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let result = executor
            .execute(
                json!({}),
                SubagentOptions {
                    cancel: CancellationToken::new(),
                    on_activity: Some(Arc::new(move |_| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    })),
                },
            )
            .await;

        // ModelResponse, ToolCall, ToolResult
        assert_eq!(result.activities.len(), 3);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_activity_log_eviction() {
        let mut activities = Vec::new();
        for i in 0..(MAX_ACTIVITY_ENTRIES + 5) {
            record(
                &mut activities,
                &None,
                i,
                ActivityKind::ToolCall,
                format!("call {}", i),
            );
        }
        assert_eq!(activities.len(), MAX_ACTIVITY_ENTRIES);
        assert_eq!(activities[0].summary, "call 5");
    }

    #[tokio::test]
    async fn test_complete_tool_without_output_key_stores_params() {
        let provider = Arc::new(ScriptedProvider::new(vec![tool_use_response(
            COMPLETION_TOOL,
            json!({"answer": "done"}),
        )]));
        let executor = make_executor(
            SubagentDefinition::new("loose", "untyped output", "You finish."),
            provider,
            vec![],
        );

        let result = executor.execute(json!({}), SubagentOptions::default()).await;
        assert_eq!(result.terminate_reason, TerminateReason::Goal);
        assert_eq!(result.output, Some(json!({"answer": "done"})));
    }
}
