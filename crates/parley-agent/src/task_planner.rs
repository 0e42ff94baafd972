//! Task planner: plan → execute → re-plan → summarize.
//!
//! The model is asked for a JSON plan naming tool-agents; each step runs in a
//! sub-session scoped to that agent's tools, and the collected results are fed
//! back until the model returns an empty plan. The final summary streams to
//! the user through the top-level session.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{EngineError, Result};
use crate::prompt::PromptTemplates;
use crate::session::{EngineContext, Session, SessionBuilder, SessionOutcome};
use crate::tools::AgentCatalog;
use crate::types::{ChatMessage, MsgChunk, Role};

/// One planned step: which agent, and what it must do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTask {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct PlanDoc {
    plan: Vec<PlanTask>,
}

fn plan_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?s)\{[\s\r\n]*"plan"\s*:\s*\[.*?\][\s\r\n]*\}"#).ok())
        .as_ref()
}

/// Pull the plan out of a free-form reply. The last match that parses wins;
/// no parsable match means an empty plan.
pub fn extract_plan(reply: &str) -> Vec<PlanTask> {
    let Some(re) = plan_regex() else {
        return Vec::new();
    };
    re.find_iter(reply)
        .filter_map(|m| serde_json::from_str::<PlanDoc>(m.as_str()).ok())
        .last()
        .map(|doc| doc.plan)
        .unwrap_or_default()
}

pub struct TaskPlanner {
    ctx: EngineContext,
    agents: Arc<AgentCatalog>,
    prompts: PromptTemplates,
    model: Option<String>,
}

impl TaskPlanner {
    pub fn new(ctx: EngineContext, agents: Arc<AgentCatalog>, prompts: PromptTemplates) -> Self {
        Self {
            ctx,
            agents,
            prompts,
            model: None,
        }
    }

    pub fn with_model(mut self, model: Option<&str>) -> Self {
        self.model = model.map(str::to_string);
        self
    }

    /// Run the planner for one user task under the task timeout. A fatal
    /// error is sent to the channel as an `Error` chunk before it is returned.
    pub async fn run(
        &self,
        user_id: &str,
        user_task: &str,
        tx: mpsc::Sender<MsgChunk>,
    ) -> Result<SessionOutcome> {
        let plan_prompt = self.prompts.render_plan(user_task, &self.agents);
        // tools belong to the agents; the planner itself only plans
        let mut top = SessionBuilder::new(self.ctx.clone(), user_id, plan_prompt, tx.clone())
            .model(self.model.as_deref())
            .tools(Vec::new())
            .question(user_task)
            .build()
            .await;

        let secs = self.ctx.config.task_timeout_secs;
        let result = match tokio::time::timeout(
            Duration::from_secs(secs),
            self.drive(&mut top, user_task, &tx),
        )
        .await
        {
            Ok(r) => r,
            Err(_) => Err(EngineError::DeadlineExceeded { secs }),
        };

        match result {
            Ok(()) => {
                tracing::info!(
                    user_id = %user_id,
                    tokens = top.tokens(),
                    "task plan completed"
                );
                Ok(top.outcome())
            }
            Err(e) => {
                top.report(&e).await;
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        top: &mut Session,
        user_task: &str,
        tx: &mpsc::Sender<MsgChunk>,
    ) -> Result<()> {
        let reply = top.sync_send().await?;
        let mut plan = extract_plan(&reply);
        if plan.is_empty() {
            tracing::debug!(user_id = %top.user_id(), "empty plan, answering directly");
            return top.deliver(&reply).await;
        }
        top.push_assistant(&reply);

        let mut subs: HashMap<String, Session> = HashMap::new();
        let mut completed: Vec<(String, String)> = Vec::new();
        let most_loop = self.ctx.config.most_loop;
        let mut rounds = 0;

        loop {
            rounds += 1;
            tracing::info!(
                user_id = %top.user_id(),
                round = rounds,
                tasks = plan.len(),
                "executing plan"
            );
            for task in &plan {
                let result = self.execute_task(&mut subs, top, task, tx).await?;
                completed.push((task.description.clone(), result));
            }

            if rounds >= most_loop {
                return Err(EngineError::TooManyLoops { limit: most_loop });
            }

            let last_plan = serde_json::to_string(&PlanDoc { plan })?;
            top.push_user(&self.prompts.render_replan(
                user_task,
                &self.agents,
                &completed,
                &last_plan,
            ));
            let reply = top.sync_send().await?;
            if reply.trim().is_empty() {
                return Err(EngineError::EmptyUpstreamResponse);
            }
            top.push_assistant(&reply);

            plan = extract_plan(&reply);
            if plan.is_empty() {
                break;
            }
        }

        top.push_user(&self.prompts.render_summary(user_task, &completed));
        top.send().await
    }

    /// Run one step in the agent's sub-session, created on first use.
    async fn execute_task(
        &self,
        subs: &mut HashMap<String, Session>,
        top: &mut Session,
        task: &PlanTask,
        tx: &mpsc::Sender<MsgChunk>,
    ) -> Result<String> {
        let sub = match subs.entry(task.name.clone()) {
            Entry::Occupied(e) => {
                let sub = e.into_mut();
                sub.push_user(&task.description);
                sub
            }
            Entry::Vacant(e) => {
                let tools = match self.agents.get(&task.name) {
                    Some(agent) => agent.tools.clone(),
                    None => {
                        tracing::warn!(
                            agent = %task.name,
                            "plan names an unknown agent, running without tools"
                        );
                        Vec::new()
                    }
                };
                let sub = SessionBuilder::new(
                    self.ctx.clone(),
                    top.user_id(),
                    task.description.clone(),
                    tx.clone(),
                )
                .model(self.model.as_deref())
                .tools(tools)
                .without_history()
                .build()
                .await;
                e.insert(sub)
            }
        };

        let before = sub.tokens();
        let mark = sub.messages().len();
        let reply = sub.sync_send().await?;
        top.add_tokens(sub.tokens() - before);

        // tool output is the task's result; the reply text alone is often empty
        let mut parts: Vec<String> = sub.messages()[mark..]
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(ChatMessage::text)
            .filter(|t| !t.trim().is_empty())
            .collect();
        if !reply.trim().is_empty() {
            parts.push(reply);
        }
        let result = if parts.is_empty() {
            format!("{} is completed", task.name)
        } else {
            parts.join("\n")
        };
        sub.push_assistant(&result);
        tracing::debug!(agent = %task.name, result_len = result.len(), "task completed");
        Ok(result)
    }
}
