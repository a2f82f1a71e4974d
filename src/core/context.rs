//! Execution context threaded through the pipeline and into tools

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Context for one caller session, passed by reference through the pipeline.
///
/// Carries the session identity, the working directory tools should resolve
/// relative paths against, and the shared abort signal. Cloning the context
/// shares the same cancellation token, so cancelling one clone cancels all
/// executions spawned from it.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Unique session ID
    pub session_id: String,

    /// Working directory for path resolution
    pub working_dir: PathBuf,

    /// Shared abort signal
    cancel: CancellationToken,
}

impl ExecutionContext {
    /// Create a context with a fresh session ID and the process working dir
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            cancel: CancellationToken::new(),
        }
    }

    /// Set the session ID
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Set the working directory
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Use an externally-owned cancellation token as the abort signal
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Get a handle to the abort signal
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Fire the abort signal for every execution using this context
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Check whether the abort signal has fired
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Derive a child context for a sub-agent.
    ///
    /// The child gets its own session ID and a child cancellation token:
    /// cancelling the parent cancels the child, but not vice versa.
    pub fn child(&self) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            working_dir: self.working_dir.clone(),
            cancel: self.cancel.child_token(),
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}
