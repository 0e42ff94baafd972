//! Prompt templates for the task planner and the agent router, plus the
//! character system prompt.
//!
//! Templates are opaque strings with `{{PLACEHOLDER}}` markers:
//!
//! | Template | Placeholders |
//! |----------|--------------|
//! | plan     | `{{USER_TASK}}`, `{{AGENTS}}` |
//! | replan   | `{{USER_TASK}}`, `{{AGENTS}}`, `{{COMPLETED_TASKS}}`, `{{LAST_PLAN}}` |
//! | summary  | `{{USER_TASK}}`, `{{COMPLETED_TASKS}}` |
//! | route    | `{{USER_TASK}}`, `{{AGENTS}}` |

use std::collections::HashMap;

use crate::tools::{AgentCatalog, PromptOverrides};

const DEFAULT_PLAN_PROMPT: &str = r#"You are a task planner. Break the user's task into steps and assign each step to one of the available agents.

Available agents:
{{AGENTS}}

User task:
{{USER_TASK}}

Reply with a JSON object of this exact shape and nothing else:
{"plan": [{"name": "<agent name>", "description": "<what this agent must do, self-contained>"}]}

Only use agent names from the list. If no agent is needed, answer the task directly in plain text without any JSON."#;

const DEFAULT_REPLAN_PROMPT: &str = r#"You are a task planner reviewing progress on the user's task.

User task:
{{USER_TASK}}

Available agents:
{{AGENTS}}

Last plan:
{{LAST_PLAN}}

Completed tasks and their results:
{{COMPLETED_TASKS}}

If more steps are needed, reply with the remaining steps only, as:
{"plan": [{"name": "<agent name>", "description": "<what this agent must do>"}]}

If the task is complete, reply with {"plan": []}"#;

const DEFAULT_SUMMARY_PROMPT: &str = r#"Using the results below, write the final answer to the user's task. Answer the user directly; do not mention agents or plans.

User task:
{{USER_TASK}}

Results:
{{COMPLETED_TASKS}}"#;

const DEFAULT_ROUTE_PROMPT: &str = r#"Choose the agent best suited to handle the user's request.

Available agents:
{{AGENTS}}

User request:
{{USER_TASK}}

Reply with a JSON object of this exact shape and nothing else:
{"agent": "<agent name>"}

If no agent fits, reply with {"agent": ""}"#;

/// Planner and router templates.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplates {
    pub plan: String,
    pub replan: String,
    pub summary: String,
    pub route: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            plan: DEFAULT_PLAN_PROMPT.to_string(),
            replan: DEFAULT_REPLAN_PROMPT.to_string(),
            summary: DEFAULT_SUMMARY_PROMPT.to_string(),
            route: DEFAULT_ROUTE_PROMPT.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Defaults with any non-empty override applied.
    pub fn with_overrides(overrides: &PromptOverrides) -> Self {
        let mut t = Self::default();
        let pick = |slot: &mut String, value: &Option<String>| {
            if let Some(v) = value.as_ref().filter(|v| !v.trim().is_empty()) {
                *slot = v.clone();
            }
        };
        pick(&mut t.plan, &overrides.plan);
        pick(&mut t.replan, &overrides.replan);
        pick(&mut t.summary, &overrides.summary);
        pick(&mut t.route, &overrides.route);
        t
    }

    pub fn render_plan(&self, user_task: &str, agents: &AgentCatalog) -> String {
        self.plan
            .replace("{{USER_TASK}}", user_task)
            .replace("{{AGENTS}}", &agents_section(agents))
    }

    pub fn render_replan(
        &self,
        user_task: &str,
        agents: &AgentCatalog,
        completed: &[(String, String)],
        last_plan: &str,
    ) -> String {
        self.replan
            .replace("{{USER_TASK}}", user_task)
            .replace("{{AGENTS}}", &agents_section(agents))
            .replace("{{COMPLETED_TASKS}}", &completed_section(completed))
            .replace("{{LAST_PLAN}}", last_plan)
    }

    pub fn render_summary(&self, user_task: &str, completed: &[(String, String)]) -> String {
        self.summary
            .replace("{{USER_TASK}}", user_task)
            .replace("{{COMPLETED_TASKS}}", &completed_section(completed))
    }

    pub fn render_route(&self, user_task: &str, agents: &AgentCatalog) -> String {
        self.route
            .replace("{{USER_TASK}}", user_task)
            .replace("{{AGENTS}}", &agents_section(agents))
    }
}

fn agents_section(agents: &AgentCatalog) -> String {
    if agents.is_empty() {
        "(none)".to_string()
    } else {
        agents.describe()
    }
}

fn completed_section(completed: &[(String, String)]) -> String {
    if completed.is_empty() {
        return "(none)".to_string();
    }
    completed
        .iter()
        .map(|(task, result)| format!("- Task: {}\n  Result: {}", task, result))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the character system prompt: `{{key}}` markers are replaced with
/// the caller's content parameters. Unknown markers are left as they are.
pub fn render_character(template: &str, params: &HashMap<String, String>) -> String {
    params.iter().fold(template.to_string(), |acc, (k, v)| {
        acc.replace(&format!("{{{{{}}}}}", k), v)
    })
}
