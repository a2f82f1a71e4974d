//! Subagent definitions and their registry

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default turn cap for a subagent run
pub const DEFAULT_MAX_TURNS: usize = 25;

/// Declarative description of a delegated task runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubagentDefinition {
    /// Unique name, used as the registry key
    pub name: String,
    /// What this subagent is for, advertised to the parent model
    pub description: String,
    /// System prompt for the subagent's own conversation
    pub system_prompt: String,
    /// Tool names the subagent may use; `None` grants the parent's full set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_tools: Option<Vec<String>>,
    /// Hard cap on conversation turns
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// Total token budget across the run; `None` means unlimited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_budget: Option<u64>,
    /// Schema of the task parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    /// Schema the completion output should satisfy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

fn default_max_turns() -> usize {
    DEFAULT_MAX_TURNS
}

impl SubagentDefinition {
    /// Create a definition with defaults
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            system_prompt: system_prompt.into(),
            allowed_tools: None,
            max_turns: DEFAULT_MAX_TURNS,
            token_budget: None,
            input_schema: None,
            output_schema: None,
        }
    }

    /// Restrict the subagent to the named tools
    pub fn with_allowed_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tools = Some(tools.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_token_budget(mut self, budget: u64) -> Self {
        self.token_budget = Some(budget);
        self
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }
}

/// Thread-safe registry of subagent definitions
#[derive(Default)]
pub struct SubagentRegistry {
    definitions: RwLock<HashMap<String, Arc<SubagentDefinition>>>,
}

impl SubagentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, replacing any existing one with the same name
    pub fn register(&self, definition: SubagentDefinition) {
        tracing::info!("[Subagent] Registering definition: {}", definition.name);
        self.definitions
            .write()
            .unwrap()
            .insert(definition.name.clone(), Arc::new(definition));
    }

    pub fn get(&self, name: &str) -> Option<Arc<SubagentDefinition>> {
        self.definitions.read().unwrap().get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> bool {
        self.definitions.write().unwrap().remove(name).is_some()
    }

    /// All registered definitions, sorted by name
    pub fn list(&self) -> Vec<Arc<SubagentDefinition>> {
        let mut all: Vec<_> = self.definitions.read().unwrap().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn len(&self) -> usize {
        self.definitions.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.read().unwrap().is_empty()
    }
}
