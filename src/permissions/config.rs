//! Permission configuration and the durable policy store
//!
//! The config file is a JSON object `{allow: [], ask: [], deny: []}` of
//! pattern strings. `PolicyStore` keeps a compiled copy behind an `RwLock`;
//! appends and reloads swap the whole compiled set under the write lock so a
//! concurrent check never observes a half-written rule set.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard};

use serde::{Deserialize, Serialize};

use crate::core::{AgentError, AgentResult};

use super::signature::PermissionPattern;

/// Ordered, layered rule lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionConfig {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub ask: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
}

impl PermissionConfig {
    /// Config with a single allow rule (test/bootstrap convenience)
    pub fn allowing(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            allow: patterns.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

/// Which rule list a pattern belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleList {
    Allow,
    Ask,
    Deny,
}

/// Compiled view of a `PermissionConfig`
#[derive(Debug)]
pub(crate) struct CompiledConfig {
    pub raw: PermissionConfig,
    pub allow: Vec<PermissionPattern>,
    pub ask: Vec<PermissionPattern>,
    pub deny: Vec<PermissionPattern>,
}

impl CompiledConfig {
    fn compile(raw: PermissionConfig) -> Self {
        fn compile_list(patterns: &[String]) -> Vec<PermissionPattern> {
            patterns.iter().map(PermissionPattern::new).collect()
        }

        Self {
            allow: compile_list(&raw.allow),
            ask: compile_list(&raw.ask),
            deny: compile_list(&raw.deny),
            raw,
        }
    }
}

/// Durable permission configuration with atomic in-memory hot reload
#[derive(Debug)]
pub struct PolicyStore {
    /// Backing file; in-memory only when `None`
    path: Option<PathBuf>,
    config: RwLock<CompiledConfig>,
}

impl PolicyStore {
    /// Create a store with no backing file
    pub fn in_memory(config: PermissionConfig) -> Self {
        Self {
            path: None,
            config: RwLock::new(CompiledConfig::compile(config)),
        }
    }

    /// Load a store from a JSON config file.
    ///
    /// A missing file yields an empty config; it is created on first append.
    pub fn load(path: impl Into<PathBuf>) -> AgentResult<Self> {
        let path = path.into();
        let config = Self::read_file(&path)?;
        Ok(Self {
            path: Some(path),
            config: RwLock::new(CompiledConfig::compile(config)),
        })
    }

    fn read_file(path: &Path) -> AgentResult<PermissionConfig> {
        if !path.exists() {
            return Ok(PermissionConfig::default());
        }
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| AgentError::InvalidConfig(format!("{}: {}", path.display(), e)))
    }

    /// Re-read the backing file and swap the compiled rule set atomically.
    ///
    /// No-op for in-memory stores.
    pub fn reload(&self) -> AgentResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let fresh = CompiledConfig::compile(Self::read_file(path)?);
        *self.config.write().unwrap() = fresh;
        tracing::info!("[PolicyStore] Reloaded permission config from {}", path.display());
        Ok(())
    }

    /// Replace the whole config (atomic swap), persisting when file-backed
    pub fn replace(&self, config: PermissionConfig) -> AgentResult<()> {
        if let Some(path) = &self.path {
            Self::persist(path, &config)?;
        }
        *self.config.write().unwrap() = CompiledConfig::compile(config);
        Ok(())
    }

    /// Append a pattern to a rule list, persist, and hot-reload in place.
    ///
    /// Duplicate patterns are ignored. The in-memory swap happens under the
    /// write lock together with the compile, so readers see either the old
    /// or the new rule set, never a mix.
    pub fn append_rule(&self, list: RuleList, pattern: &str) -> AgentResult<()> {
        let mut guard = self.config.write().unwrap();
        let target = match list {
            RuleList::Allow => &mut guard.raw.allow,
            RuleList::Ask => &mut guard.raw.ask,
            RuleList::Deny => &mut guard.raw.deny,
        };
        if target.iter().any(|existing| existing == pattern) {
            return Ok(());
        }
        target.push(pattern.to_string());
        tracing::info!("[PolicyStore] Appended {:?} rule: {}", list, pattern);

        let raw = guard.raw.clone();
        if let Some(path) = &self.path {
            Self::persist(path, &raw)?;
        }
        *guard = CompiledConfig::compile(raw);
        Ok(())
    }

    fn persist(path: &Path, config: &PermissionConfig) -> AgentResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(config)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Snapshot the current raw config
    pub fn snapshot(&self) -> PermissionConfig {
        self.config.read().unwrap().raw.clone()
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, CompiledConfig> {
        self.config.read().unwrap()
    }
}
