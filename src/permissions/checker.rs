//! Permission checker
//!
//! Resolves a tool-invocation descriptor against the layered rule lists:
//! deny first (always wins), then allow, then the policy-mode default, then
//! the ask list with session memoization. Exactly one check result is
//! produced per execution.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::AgentResult;
use crate::tools::{Tool, ToolKind};

use super::config::{PolicyStore, RuleList};
use super::signature::{build_signature, is_path_key, match_list, MatchType};

/// Matched rule label for session-remembered approvals
pub const REMEMBERED_SESSION: &str = "remembered:session";

/// Policy mode, the lowest-priority layer of the decision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    /// Read-only tools run, everything else asks
    #[default]
    Default,
    /// Read-only and edit tools run, everything else asks
    AutoEdit,
    /// Everything runs
    Yolo,
}

impl PolicyMode {
    /// Whether this mode auto-approves the given tool kind
    pub fn auto_approves(&self, kind: ToolKind) -> bool {
        match kind {
            ToolKind::ReadOnly => true,
            ToolKind::Edit => matches!(self, PolicyMode::AutoEdit | PolicyMode::Yolo),
            _ => matches!(self, PolicyMode::Yolo),
        }
    }
}

/// The decision for one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
    Ask,
}

/// Result of checking one invocation against policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionCheckResult {
    pub decision: Decision,
    /// The rule pattern that matched, if any
    pub matched_rule: Option<String>,
    /// How the rule matched; `None` for mode defaults and session approvals
    pub match_type: Option<MatchType>,
    pub reason: String,
}

impl PermissionCheckResult {
    /// Whether this allow came from an explicit allow-list rule (as opposed
    /// to a mode default or a remembered session approval)
    pub fn is_explicit_allow(&self) -> bool {
        self.decision == Decision::Allow
            && self.match_type.is_some()
            && self.matched_rule.as_deref() != Some(REMEMBERED_SESSION)
    }
}

/// Ephemeral descriptor of one tool invocation, built fresh per call
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub params: Value,
    pub affected_paths: Vec<String>,
    pub kind: ToolKind,
    /// Deterministic signature used for policy lookup and memoization
    pub signature: String,
}

impl ToolInvocation {
    /// Build the descriptor from a tool and its parameters
    pub fn from_tool(tool: &dyn Tool, params: Value) -> Self {
        let content = tool.extract_signature_content(&params);
        let signature = build_signature(tool.name(), content.as_deref());
        Self {
            tool_name: tool.name().to_string(),
            affected_paths: tool.affected_paths(&params),
            kind: tool.kind(),
            signature,
            params,
        }
    }
}

/// The policy/permission engine
pub struct PermissionChecker {
    store: Arc<PolicyStore>,
    mode: RwLock<PolicyMode>,
    /// Signatures approved with "remember for session"; process lifetime
    session: RwLock<HashSet<String>>,
}

impl PermissionChecker {
    /// Create a checker over a policy store, in `Default` mode
    pub fn new(store: Arc<PolicyStore>) -> Self {
        Self {
            store,
            mode: RwLock::new(PolicyMode::Default),
            session: RwLock::new(HashSet::new()),
        }
    }

    /// Set the policy mode at construction
    pub fn with_mode(self, mode: PolicyMode) -> Self {
        *self.mode.write().unwrap() = mode;
        self
    }

    /// Change the policy mode at runtime
    pub fn set_mode(&self, mode: PolicyMode) {
        tracing::info!("[Permissions] Policy mode set to {:?}", mode);
        *self.mode.write().unwrap() = mode;
    }

    /// Current policy mode
    pub fn mode(&self) -> PolicyMode {
        *self.mode.read().unwrap()
    }

    /// The durable policy store backing this checker
    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    /// Resolve an invocation to a decision.
    ///
    /// Order: deny list, allow list, mode default, ask list. Any would-be
    /// `Ask` escalates to `Allow` when the signature was remembered for this
    /// session.
    pub fn check(&self, invocation: &ToolInvocation) -> PermissionCheckResult {
        let signature = &invocation.signature;
        let config = self.store.read();

        if let Some((rule, match_type)) = match_list(&config.deny, signature) {
            return PermissionCheckResult {
                decision: Decision::Deny,
                matched_rule: Some(rule.raw().to_string()),
                match_type: Some(match_type),
                reason: format!("denied by rule '{}'", rule.raw()),
            };
        }

        if let Some((rule, match_type)) = match_list(&config.allow, signature) {
            return PermissionCheckResult {
                decision: Decision::Allow,
                matched_rule: Some(rule.raw().to_string()),
                match_type: Some(match_type),
                reason: format!("allowed by rule '{}'", rule.raw()),
            };
        }

        let mode = self.mode();
        if mode.auto_approves(invocation.kind) {
            return PermissionCheckResult {
                decision: Decision::Allow,
                matched_rule: None,
                match_type: None,
                reason: format!("{:?} mode auto-approves {:?} tools", mode, invocation.kind),
            };
        }

        let ask_match = match_list(&config.ask, signature)
            .map(|(rule, match_type)| (rule.raw().to_string(), match_type));
        drop(config);

        if self.is_session_approved(signature) {
            return PermissionCheckResult {
                decision: Decision::Allow,
                matched_rule: Some(REMEMBERED_SESSION.to_string()),
                match_type: None,
                reason: "signature approved earlier this session".to_string(),
            };
        }

        match ask_match {
            Some((rule, match_type)) => PermissionCheckResult {
                decision: Decision::Ask,
                matched_rule: Some(rule.clone()),
                match_type: Some(match_type),
                reason: format!("rule '{}' requires confirmation", rule),
            },
            None => PermissionCheckResult {
                decision: Decision::Ask,
                matched_rule: None,
                match_type: None,
                reason: "no rule matched".to_string(),
            },
        }
    }

    /// Record a signature as approved for the rest of this session
    pub fn remember_for_session(&self, signature: impl Into<String>) {
        let signature = signature.into();
        tracing::info!("[Permissions] Remembering for session: {}", signature);
        self.session.write().unwrap().insert(signature);
    }

    /// Whether a signature was approved earlier this session
    pub fn is_session_approved(&self, signature: &str) -> bool {
        self.session.read().unwrap().contains(signature)
    }

    /// Derive the generalized pattern persisted after a session approval.
    ///
    /// Prefers the tool-supplied rule; otherwise widens a trailing path to a
    /// directory glob or an extension wildcard, falling back to the concrete
    /// signature.
    pub fn abstract_pattern(&self, invocation: &ToolInvocation, tool_rule: Option<String>) -> String {
        if let Some(rule) = tool_rule {
            return rule;
        }
        match extract_content(&invocation.signature) {
            Some(content) => match generalize_content(content) {
                Some(general) => format!("{}({})", invocation.tool_name, general),
                None => invocation.signature.clone(),
            },
            None => invocation.signature.clone(),
        }
    }

    /// Append a generalized pattern to the durable allow list and hot-reload
    pub fn persist_allow_pattern(&self, pattern: &str) -> AgentResult<()> {
        self.store.append_rule(RuleList::Allow, pattern)
    }
}

fn extract_content(signature: &str) -> Option<&str> {
    let open = signature.find('(')?;
    signature
        .ends_with(')')
        .then(|| &signature[open + 1..signature.len() - 1])
}

/// Widen `key:value` content: paths collapse to their directory (`dir/**`),
/// bare file names to their extension (`*.ext`). Only path-valued keys are
/// widened; a shell command containing `/` is not a directory and persists
/// as its concrete signature.
fn generalize_content(content: &str) -> Option<String> {
    let (key, value) = match content.find(':') {
        Some(idx) => (&content[..idx], &content[idx + 1..]),
        None => return None,
    };
    if !is_path_key(key) {
        return None;
    }
    if let Some(slash) = value.rfind('/') {
        let dir = &value[..slash];
        if !dir.is_empty() {
            return Some(format!("{}:{}/**", key, dir));
        }
    }
    if let Some(dot) = value.rfind('.') {
        let ext = &value[dot + 1..];
        if !ext.is_empty() {
            return Some(format!("{}:*.{}", key, ext));
        }
    }
    None
}
