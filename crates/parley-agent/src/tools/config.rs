//! Agents file: tool-agents, their tools and prompt overrides, in YAML.
//!
//! ```yaml
//! prompts:
//!   summary: "Summarize {{COMPLETED_TASKS}} for: {{USER_TASK}}"
//! agents:
//!   - name: weather
//!     description: Looks up current weather and forecasts
//!     tools:
//!       - name: get_weather
//!         description: Current weather for a city
//!         parameters:
//!           type: object
//!           properties:
//!             city: { type: string }
//!           required: [city]
//!         command: ["python3", "tools/weather.py"]
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{AgentCatalog, AgentInfo, CommandToolClient, StaticToolRegistry};
use crate::types::ToolDefinition;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentsFile {
    #[serde(default)]
    pub prompts: PromptOverrides,
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
}

/// Replacement prompt templates; unset or blank entries keep the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptOverrides {
    pub plan: Option<String>,
    pub replan: Option<String>,
    pub summary: Option<String>,
    pub route: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON schema of the arguments object.
    #[serde(default = "empty_object_schema")]
    pub parameters: Value,
    /// Program and arguments; the JSON arguments are written to stdin.
    pub command: Vec<String>,
    /// Working directory, relative to the agents file.
    #[serde(default)]
    pub workdir: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn empty_object_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

impl ToolSpec {
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(&self.name, &self.description, self.parameters.clone())
    }
}

impl AgentsFile {
    pub fn parse(yaml: &str) -> Result<Self> {
        let file: AgentsFile = serde_yaml::from_str(yaml).context("Invalid agents YAML")?;
        file.validate()?;
        Ok(file)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read agents file: {}", path.display()))?;
        let mut file = Self::parse(&content)?;
        if let Some(base) = path.parent() {
            file.resolve_workdirs(base);
        }
        Ok(file)
    }

    fn validate(&self) -> Result<()> {
        for agent in &self.agents {
            if agent.name.trim().is_empty() {
                bail!("agent with empty name");
            }
            for tool in &agent.tools {
                if tool.name.trim().is_empty() {
                    bail!("agent '{}' has a tool with an empty name", agent.name);
                }
                if tool.command.is_empty() {
                    bail!("tool '{}' of agent '{}' has no command", tool.name, agent.name);
                }
            }
        }
        Ok(())
    }

    fn resolve_workdirs(&mut self, base: &Path) {
        for tool in self.agents.iter_mut().flat_map(|a| a.tools.iter_mut()) {
            if let Some(dir) = &tool.workdir {
                let p = Path::new(dir);
                if p.is_relative() {
                    tool.workdir = Some(base.join(p).to_string_lossy().to_string());
                }
            }
        }
    }

    /// Build the tool registry and the agent catalog.
    pub fn build(&self) -> Result<(StaticToolRegistry, AgentCatalog)> {
        let mut registry = StaticToolRegistry::new();
        let mut catalog = AgentCatalog::new();
        for agent in &self.agents {
            let mut definitions = Vec::with_capacity(agent.tools.len());
            for tool in &agent.tools {
                let mut client = CommandToolClient::from_argv(&tool.command)?;
                if let Some(dir) = &tool.workdir {
                    client = client.with_workdir(dir);
                }
                if let Some(secs) = tool.timeout_secs {
                    client = client.with_timeout(Duration::from_secs(secs));
                }
                let definition = tool.definition();
                registry.register(definition.clone(), Arc::new(client));
                definitions.push(definition);
            }
            catalog.insert(AgentInfo {
                name: agent.name.clone(),
                description: agent.description.clone(),
                tools: definitions,
            });
        }
        tracing::debug!(agents = catalog.len(), tools = registry.len(), "agents file loaded");
        Ok((registry, catalog))
    }
}
