//! Model interface layer
//!
//! Message/content types shared by the pipeline and the sub-agent loop, plus
//! the `ModelProvider` trait concrete adapters implement.

pub mod provider;
pub mod types;

pub use provider::ModelProvider;
pub use types::{
    ContentBlock, Message, ModelResponse, Role, StopReason, TokenUsage, ToolDefinition,
    ToolInputSchema,
};
