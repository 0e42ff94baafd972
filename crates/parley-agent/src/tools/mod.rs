//! Tool registry: the contract the engine uses to execute tools by name,
//! plus the named tool-agents the planner and router choose from.
//!
//! The transport behind a tool is opaque to the engine. Built-in clients:
//!   - [`CommandToolClient`]: runs a local command, JSON arguments on stdin
//!   - anything implementing [`ToolClient`] (MCP bridges, in-process tools)

mod command;
mod config;

pub use command::CommandToolClient;
pub use config::{AgentSpec, AgentsFile, PromptOverrides, ToolSpec};

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::types::ToolDefinition;

// ─── Contracts ──────────────────────────────────────────────────────────────

/// Executes tools by name. Any error means "this tool failed".
#[async_trait]
pub trait ToolClient: Send + Sync {
    async fn exec_tool(&self, name: &str, args: &Map<String, Value>) -> Result<String>;
}

/// Resolves the client responsible for a tool.
pub trait ToolRegistry: Send + Sync {
    fn resolve_tool_client(&self, name: &str) -> Result<Arc<dyn ToolClient>>;

    /// Every tool the registry can execute.
    fn definitions(&self) -> Vec<ToolDefinition>;
}

// ─── StaticToolRegistry ─────────────────────────────────────────────────────

struct RegisteredTool {
    definition: ToolDefinition,
    client: Arc<dyn ToolClient>,
}

/// In-memory registry, name → (definition, client).
#[derive(Default)]
pub struct StaticToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl StaticToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A later registration under the same name replaces the earlier one.
    pub fn register(
        &mut self,
        definition: ToolDefinition,
        client: Arc<dyn ToolClient>,
    ) -> &mut Self {
        let name = definition.name().to_string();
        if self.tools.contains_key(&name) {
            tracing::warn!(tool = %name, "tool registered twice, keeping the last one");
        }
        self.tools.insert(name, RegisteredTool { definition, client });
        self
    }

    pub fn with(mut self, definition: ToolDefinition, client: Arc<dyn ToolClient>) -> Self {
        self.register(definition, client);
        self
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}

impl ToolRegistry for StaticToolRegistry {
    fn resolve_tool_client(&self, name: &str) -> Result<Arc<dyn ToolClient>> {
        self.tools
            .get(name)
            .map(|t| Arc::clone(&t.client))
            .ok_or_else(|| anyhow!("tool '{}' not found", name))
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition.clone()).collect()
    }
}

// ─── Tool-agents ────────────────────────────────────────────────────────────

/// A named, pre-scoped set of tools plus a description the model sees.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentInfo {
    pub name: String,
    pub description: String,
    pub tools: Vec<ToolDefinition>,
}

impl AgentInfo {
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(ToolDefinition::name).collect()
    }
}

/// Tool-agents by name.
#[derive(Debug, Clone, Default)]
pub struct AgentCatalog {
    agents: BTreeMap<String, AgentInfo>,
}

impl AgentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, agent: AgentInfo) {
        self.agents.insert(agent.name.clone(), agent);
    }

    pub fn with(mut self, agent: AgentInfo) -> Self {
        self.insert(agent);
        self
    }

    pub fn get(&self, name: &str) -> Option<&AgentInfo> {
        self.agents.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentInfo> {
        self.agents.values()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// One `- name: description` line per agent, for prompts.
    pub fn describe(&self) -> String {
        self.agents
            .values()
            .map(|a| format!("- {}: {}", a.name, a.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
