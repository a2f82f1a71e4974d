//! Configurable stub tool shared by unit tests across modules

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::llm::{ToolDefinition, ToolInputSchema};

use super::tool::{ProgressFn, Tool, ToolKind, ToolResult};

/// Stub tool with configurable kind, signature extraction, paths, and timing
pub(crate) struct StubTool {
    name: String,
    kind: ToolKind,
    tags: Vec<String>,
    signature_key: Option<String>,
    path_key: Option<String>,
    delay: Duration,
    fail_with: Option<String>,
    reject_params: bool,
    calls: Arc<AtomicUsize>,
}

impl StubTool {
    pub fn new(name: impl Into<String>, kind: ToolKind) -> Self {
        Self {
            name: name.into(),
            kind,
            tags: Vec::new(),
            signature_key: None,
            path_key: None,
            delay: Duration::ZERO,
            fail_with: None,
            reject_params: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn read_only(name: impl Into<String>) -> Self {
        Self::new(name, ToolKind::ReadOnly)
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Extract `"{key}:{value}"` signature content from the named parameter
    pub fn with_signature_key(mut self, key: impl Into<String>) -> Self {
        self.signature_key = Some(key.into());
        self
    }

    /// Report the named string parameter as an affected path
    pub fn with_path_key(mut self, key: impl Into<String>) -> Self {
        self.path_key = Some(key.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }

    /// Reject every parameter shape at the Discovery stage
    pub fn rejecting_params(mut self) -> Self {
        self.reject_params = true;
        self
    }

    /// Shared execution counter
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl Tool for StubTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "stub tool for tests"
    }

    fn kind(&self) -> ToolKind {
        self.kind
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: Some(self.description().to_string()),
            input_schema: ToolInputSchema::object(json!({}), Vec::new()),
        }
    }

    fn tags(&self) -> Vec<String> {
        self.tags.clone()
    }

    fn validate_params(&self, _params: &Value) -> Result<()> {
        if self.reject_params {
            return Err(anyhow!("unknown field"));
        }
        Ok(())
    }

    fn affected_paths(&self, params: &Value) -> Vec<String> {
        self.path_key
            .as_deref()
            .and_then(|key| params.get(key))
            .and_then(|v| v.as_str())
            .map(|path| vec![path.to_string()])
            .unwrap_or_default()
    }

    fn extract_signature_content(&self, params: &Value) -> Option<String> {
        let key = self.signature_key.as_deref()?;
        let value = params.get(key)?.as_str()?;
        Some(format!("{}:{}", key, value))
    }

    async fn execute(
        &self,
        _params: &Value,
        signal: CancellationToken,
        on_progress: Option<ProgressFn>,
    ) -> Result<ToolResult> {
        if !self.delay.is_zero() {
            tokio::select! {
                _ = signal.cancelled() => return Err(anyhow!("cancelled")),
                _ = tokio::time::sleep(self.delay) => {}
            }
        }

        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(progress) = on_progress {
            progress(&format!("{} running", self.name));
        }

        match &self.fail_with {
            Some(message) => Err(anyhow!("{}", message)),
            None => Ok(ToolResult::success(format!("{} ok", self.name))),
        }
    }
}
