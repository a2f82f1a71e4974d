//! Crate error types

use thiserror::Error;

/// Errors that can occur in the gating core
#[derive(Error, Debug)]
pub enum AgentError {
    /// Tool not present in the registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool parameters failed validation at the registry boundary
    #[error("Invalid parameters for {tool}: {message}")]
    InvalidParams { tool: String, message: String },

    /// Policy or safety layer denied the invocation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The user declined a confirmation prompt
    #[error("Confirmation denied: {0}")]
    ConfirmationDenied(String),

    /// A sub-agent crossed its token budget
    #[error("Token budget exceeded: used {used} of {budget}")]
    BudgetExceeded { used: u64, budget: u64 },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Execution was cancelled via the abort signal
    #[error("Interrupted")]
    Interrupted,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        AgentError::Other(msg.into())
    }
}

/// Result type alias for gating-core operations
pub type AgentResult<T> = Result<T, AgentError>;
