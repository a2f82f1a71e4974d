//! Tool registry for managing available tools
//!
//! The registry holds all tools available to one pipeline. It supports
//! lookup, kind/tag indexing, hot registration and unregistration, an
//! explicit observer list for change notifications, and isolated deep copies
//! for sub-agents.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use crate::llm::ToolDefinition;

use super::tool::{Tool, ToolKind};

/// Observer notified on registry changes.
///
/// Subscribers are held as `Weak` references: dropping the subscriber's `Arc`
/// unsubscribes it, so lifecycle is enforced by ownership rather than by a
/// forgotten `removeListener` call.
pub trait RegistryObserver: Send + Sync {
    /// A tool was registered under `name`
    fn tool_registered(&self, name: &str);

    /// The tool under `name` was removed
    fn tool_unregistered(&self, name: &str);
}

/// Registry that holds all available tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,

    /// Tag index: tag -> tool names
    tags: HashMap<String, HashSet<String>>,

    observers: Vec<Weak<dyn RegistryObserver>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            tags: HashMap::new(),
            observers: Vec::new(),
        }
    }

    /// Register a tool in the registry.
    ///
    /// Replaces any tool previously registered under the same name.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Register an already-shared tool handle
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        tracing::info!("[ToolRegistry] Registering tool: {}", name);

        for tag in tool.tags() {
            self.tags.entry(tag).or_default().insert(name.clone());
        }
        self.tools.insert(name.clone(), tool);
        self.notify(|o| o.tool_registered(&name));
    }

    /// Remove a tool from the registry
    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        let removed = self.tools.remove(name)?;
        tracing::info!("[ToolRegistry] Unregistering tool: {}", name);

        for members in self.tags.values_mut() {
            members.remove(name);
        }
        self.tags.retain(|_, members| !members.is_empty());
        self.notify(|o| o.tool_unregistered(name));
        Some(removed)
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Check whether a tool is registered
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get all tool definitions for the model
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Get the names of tools with the given capability kind
    pub fn by_kind(&self, kind: ToolKind) -> Vec<String> {
        self.tools
            .values()
            .filter(|t| t.kind() == kind)
            .map(|t| t.name().to_string())
            .collect()
    }

    /// Get the names of tools carrying the given tag
    pub fn by_tag(&self, tag: &str) -> Vec<String> {
        self.tags
            .get(tag)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Subscribe an observer to registry changes.
    ///
    /// The registry keeps only a weak reference; the subscription ends when
    /// the caller drops its `Arc`.
    pub fn subscribe(&mut self, observer: &Arc<dyn RegistryObserver>) {
        self.observers.push(Arc::downgrade(observer));
    }

    fn notify(&mut self, f: impl Fn(&dyn RegistryObserver)) {
        self.observers.retain(|weak| match weak.upgrade() {
            Some(observer) => {
                f(observer.as_ref());
                true
            }
            None => false,
        });
    }

    /// Build an independently-owned copy for a sub-agent.
    ///
    /// With `allowed = None` every tool is copied; otherwise only the named
    /// subset, warning on names not present here. The copy shares tool
    /// handles but owns its own map: removing a tool from either registry
    /// never affects the other. Observers are not carried over.
    pub fn isolated_copy(&self, allowed: Option<&[String]>) -> ToolRegistry {
        let mut copy = ToolRegistry::new();
        match allowed {
            None => {
                for tool in self.tools.values() {
                    copy.register_arc(tool.clone());
                }
            }
            Some(names) => {
                for name in names {
                    match self.tools.get(name) {
                        Some(tool) => copy.register_arc(tool.clone()),
                        None => tracing::warn!(
                            "[ToolRegistry] Allowed tool '{}' not found in parent registry",
                            name
                        ),
                    }
                }
            }
        }
        copy
    }

    /// Get the list of tool names
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
