//! Policy/permission engine
//!
//! Signature derivation, rule pattern matching, the layered checker with
//! policy modes and session memoization, the durable config store, and the
//! hard-coded path safety layer.

pub mod checker;
pub mod config;
pub mod safety;
pub mod signature;

pub use checker::{
    Decision, PermissionCheckResult, PermissionChecker, PolicyMode, ToolInvocation,
    REMEMBERED_SESSION,
};
pub use config::{PermissionConfig, PolicyStore, RuleList};
pub use safety::{SafetyViolation, Sensitivity};
pub use signature::{build_signature, MatchType, PermissionPattern};
