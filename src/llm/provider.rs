//! Model provider trait
//!
//! Abstracts the model interface the sub-agent loop needs. Concrete HTTP
//! adapters (Anthropic, Gemini, ...) live outside this crate and implement
//! this trait; providers with a different wire format translate internally.

use anyhow::Result;

use super::types::{Message, ModelResponse, ToolDefinition};

/// Trait for model backends usable by the agentic loop
#[async_trait::async_trait]
pub trait ModelProvider: Send + Sync {
    /// Run one model turn with tools and an optional system prompt
    async fn complete(
        &self,
        messages: Vec<Message>,
        system: Option<&str>,
        tools: Vec<ToolDefinition>,
    ) -> Result<ModelResponse>;

    /// Get the current model name
    fn model(&self) -> &str;
}
