//! Agent router: one single-shot call picks the tool-agent, then a streaming
//! session scoped to that agent's tools answers the request.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::error::{EngineError, Result};
use crate::prompt::PromptTemplates;
use crate::session::{EngineContext, SessionBuilder, SessionOutcome};
use crate::tools::AgentCatalog;
use crate::types::{ChatMessage, MsgChunk};

#[derive(Deserialize)]
struct RouteDoc {
    agent: String,
}

fn route_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\{\s*"agent"\s*:\s*"[^"]*"\s*\}"#).ok())
        .as_ref()
}

/// Agent name chosen in a routing reply; `None` when the reply names none.
pub fn extract_agent(reply: &str) -> Option<String> {
    let re = route_regex()?;
    re.find_iter(reply)
        .filter_map(|m| serde_json::from_str::<RouteDoc>(m.as_str()).ok())
        .map(|doc| doc.agent.trim().to_string())
        .filter(|name| !name.is_empty())
        .last()
}

/// The routing decision and what it cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub agent: Option<String>,
    pub tokens: u64,
}

pub struct AgentRouter {
    ctx: EngineContext,
    agents: Arc<AgentCatalog>,
    prompts: PromptTemplates,
    model: Option<String>,
}

impl AgentRouter {
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

    /// Ask the model which agent should serve `user_task`.
    pub async fn route(&self, user_task: &str) -> Result<Route> {
        let model = self
            .ctx
            .models
            .select_model(self.ctx.client.vendor(), self.model.as_deref());
        let prompt = self.prompts.render_route(user_task, &self.agents);
        let completion = self
            .ctx
            .client
            .complete(&model, &[ChatMessage::user(&prompt)], &[])
            .await?;

        let agent = extract_agent(&completion.content);
        match agent.as_deref() {
            Some(name) if self.agents.get(name).is_none() => {
                tracing::warn!(agent = %name, "router picked an unknown agent")
            }
            None => tracing::debug!("router picked no agent"),
            _ => {}
        }
        Ok(Route {
            agent,
            tokens: completion.total_tokens,
        })
    }

    /// Route, then stream the answer from a session scoped to the chosen
    /// agent's tools. Routing runs under the session timeout; a routing
    /// failure is sent to the channel as an `Error` chunk before it is returned.
    pub async fn run(
        &self,
        user_id: &str,
        prompt: &str,
        tx: mpsc::Sender<MsgChunk>,
    ) -> Result<SessionOutcome> {
        let secs = self.ctx.config.session_timeout_secs;
        let deadline = Duration::from_secs(secs);
        let routed = match tokio::time::timeout(deadline, self.route(prompt)).await {
            Ok(r) => r,
            Err(_) => Err(EngineError::DeadlineExceeded { secs }),
        };
        let route = match routed {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(user_id = %user_id, err = %e, "routing failed");
                if tx.send(MsgChunk::error(e.to_string())).await.is_err() {
                    tracing::debug!(user_id = %user_id, "error chunk dropped, channel closed");
                }
                return Err(e);
            }
        };

        let tools = route
            .agent
            .as_deref()
            .and_then(|name| self.agents.get(name))
            .map(|agent| agent.tools.clone())
            .unwrap_or_default();
        tracing::info!(
            user_id = %user_id,
            agent = route.agent.as_deref().unwrap_or("-"),
            tools = tools.len(),
            "request routed"
        );

        SessionBuilder::new(self.ctx.clone(), user_id, prompt, tx)
            .model(self.model.as_deref())
            .tools(tools)
            .initial_tokens(route.tokens)
            .build()
            .await
            .run()
            .await
    }
}
