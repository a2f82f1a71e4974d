//! Confirmation contract
//!
//! The Confirmation stage suspends on an externally-supplied handler (the
//! UI) when policy resolves to Ask. The handler answers with an approval and
//! a scope; session-scoped approvals are memoized and persisted as
//! generalized patterns.

use async_trait::async_trait;

/// Human-readable payload for a confirmation prompt
#[derive(Debug, Clone)]
pub struct ConfirmationDetails {
    pub title: String,
    pub message: String,
    /// Enumerated risk strings for display
    pub risks: Vec<String>,
    /// Paths this invocation would touch
    pub affected_paths: Vec<String>,
}

/// How long an approval holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalScope {
    /// This invocation only
    Once,
    /// Remember for the rest of the session and persist a generalized rule
    Session,
}

/// The user's answer to a confirmation prompt
#[derive(Debug, Clone)]
pub struct ConfirmationOutcome {
    pub approved: bool,
    pub reason: Option<String>,
    pub scope: ApprovalScope,
}

impl ConfirmationOutcome {
    /// Approve this invocation only
    pub fn approved_once() -> Self {
        Self {
            approved: true,
            reason: None,
            scope: ApprovalScope::Once,
        }
    }

    /// Approve and remember for the session
    pub fn approved_for_session() -> Self {
        Self {
            approved: true,
            reason: None,
            scope: ApprovalScope::Session,
        }
    }

    /// Deny with a reason
    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: Some(reason.into()),
            scope: ApprovalScope::Once,
        }
    }
}

/// UI-supplied confirmation handler.
///
/// There is no timeout: the execution suspends until the handler answers or
/// the abort signal fires.
#[async_trait]
pub trait ConfirmationHandler: Send + Sync {
    async fn request_confirmation(&self, details: ConfirmationDetails) -> ConfirmationOutcome;
}
