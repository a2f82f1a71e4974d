//! Tool trait definition
//!
//! All tools implement this trait to provide a consistent interface to the
//! pipeline: the Discovery stage validates parameters, the Permission stage
//! reads the kind, affected paths, and signature content, and the Execution
//! stage invokes the behavior with the abort signal and a progress callback.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::llm::ToolDefinition;

/// Capability kind of a tool, drives policy-mode auto-approval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Inspects state without mutating anything
    ReadOnly,
    /// Modifies files in the workspace
    Edit,
    /// Runs commands or subprocesses
    Execute,
    /// Talks to the network
    Network,
    /// Anything else
    Other,
}

impl ToolKind {
    /// Whether this kind never mutates state
    pub fn is_read_only(&self) -> bool {
        matches!(self, ToolKind::ReadOnly)
    }

    /// Human-readable risk string for confirmation prompts
    pub fn risk_description(&self) -> Option<&'static str> {
        match self {
            ToolKind::ReadOnly => None,
            ToolKind::Edit => Some("Modifies files on disk"),
            ToolKind::Execute => Some("Runs commands on this machine"),
            ToolKind::Network => Some("Sends requests over the network"),
            ToolKind::Other => Some("Performs an action outside the workspace sandbox"),
        }
    }
}

/// Classified failure attached to a `ToolResult`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// Tool missing from the registry
    NotFound,
    /// Parameters rejected before the pipeline ran
    InvalidParams,
    /// Denied by policy or the hard-coded safety layer (non-retryable)
    PolicyDenied,
    /// The user declined the confirmation prompt
    UserDenied,
    /// The tool body failed
    ExecutionError,
    /// The abort signal fired
    Cancelled,
}

/// Structured error carried on failed results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    #[serde(rename = "type")]
    pub kind: ToolErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Metadata stamped onto every formatted result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub tool_name: String,
    pub session_id: String,
    pub execution_id: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Result of executing a tool through the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the invocation succeeded
    pub success: bool,
    /// Content fed back to the model
    pub llm_content: String,
    /// Content shown to the user (falls back to `llm_content`)
    pub display_content: String,
    /// Structured error when `success` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
    /// Execution metadata, stamped by the Formatting stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResultMetadata>,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            success: true,
            display_content: content.clone(),
            llm_content: content,
            error: None,
            metadata: None,
        }
    }

    /// Create a successful result with distinct model/user content
    pub fn success_with_display(
        llm_content: impl Into<String>,
        display_content: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            llm_content: llm_content.into(),
            display_content: display_content.into(),
            error: None,
            metadata: None,
        }
    }

    /// Create a failed result with a classified error
    pub fn failure(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            llm_content: message.clone(),
            display_content: message.clone(),
            error: Some(ToolError {
                kind,
                message,
                details: None,
            }),
            metadata: None,
        }
    }

    /// Attach structured details to the error, if there is one
    pub fn with_error_details(mut self, details: Value) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.details = Some(details);
        }
        self
    }
}

/// Progress callback handed to long-running tools
pub type ProgressFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Trait for tools that the agent can use
///
/// Tools are registered in a `ToolRegistry` and executed only through the
/// `ExecutionPipeline`, which is responsible for permission gating,
/// confirmation, and per-path serialization.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the name of this tool
    fn name(&self) -> &str;

    /// Get a description of this tool
    fn description(&self) -> &str;

    /// Get the capability kind of this tool
    fn kind(&self) -> ToolKind;

    /// Get the tool definition advertised to the model
    fn definition(&self) -> ToolDefinition;

    /// Tags for registry indexing (optional)
    fn tags(&self) -> Vec<String> {
        Vec::new()
    }

    /// Validate a parameter shape before the pipeline runs.
    ///
    /// Typically a `serde` deserialize of the tool's input struct. Invalid
    /// shapes abort the execution at the Discovery stage, before the
    /// Permission stage ever sees them.
    fn validate_params(&self, _params: &Value) -> Result<()> {
        Ok(())
    }

    /// Filesystem paths this invocation would touch.
    ///
    /// Used by the safety layer and by the Execution stage to serialize
    /// mutating operations per path.
    fn affected_paths(&self, _params: &Value) -> Vec<String> {
        Vec::new()
    }

    /// Extract the content part of the permission signature.
    ///
    /// Returning `None` makes the signature the bare tool name; returning
    /// `Some("file_path:/a/b.txt")` makes it `Name(file_path:/a/b.txt)`.
    fn extract_signature_content(&self, _params: &Value) -> Option<String> {
        None
    }

    /// Produce a generalized permission pattern for "remember for session".
    ///
    /// When present, this pattern (not the literal signature) is persisted to
    /// durable config so similar future calls are also covered. When absent
    /// the checker derives one from the signature.
    fn abstract_permission_rule(&self, _params: &Value) -> Option<String> {
        None
    }

    /// Execute the tool with the given input.
    ///
    /// Long-running tools must observe the abort signal and terminate any
    /// child processes when it fires, not just stop awaiting them.
    async fn execute(
        &self,
        params: &Value,
        signal: CancellationToken,
        on_progress: Option<ProgressFn>,
    ) -> Result<ToolResult>;
}
