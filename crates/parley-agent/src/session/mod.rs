//! Session: one user turn driven to completion.
//!
//! `Sending → {ToolsPending → Sending}* → Done`. Each streaming round feeds
//! tool-call fragments to the accumulator and content to the emitter. A round
//! that ends with executed tools splices the assistant turn and its tool
//! results into the history and sends again; a round without tool calls
//! flushes the emitter and persists one history record. The round bound is
//! checked on every entry into `Sending`.

mod execution;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parley_core::config::EngineConfig;
use tokio::sync::mpsc;

use self::execution::{execute_tool_calls, ExecutedCall};
use crate::accumulator::ToolCallAccumulator;
use crate::emitter::ChunkEmitter;
use crate::error::{EngineError, Result};
use crate::history::{AqRecord, HistoryStore, MemoryHistoryStore};
use crate::llm::{LlmClient, ModelRegistry, Vendor};
use crate::prompt::render_character;
use crate::tools::{StaticToolRegistry, ToolRegistry};
use crate::types::{ChatMessage, MsgChunk, ToolCall, ToolDefinition};

// ─── Shared collaborators ───────────────────────────────────────────────────

/// Long-lived collaborators shared by every session of a process.
#[derive(Clone)]
pub struct EngineContext {
    pub client: Arc<LlmClient>,
    pub models: Arc<ModelRegistry>,
    pub tools: Arc<dyn ToolRegistry>,
    pub history: Arc<dyn HistoryStore>,
    pub config: EngineConfig,
}

impl EngineContext {
    /// Context with no tools and an in-memory history.
    pub fn new(client: Arc<LlmClient>, config: EngineConfig) -> Self {
        let history = MemoryHistoryStore::new(config.history_pairs);
        Self {
            client,
            models: Arc::new(ModelRegistry::builtin()),
            tools: Arc::new(StaticToolRegistry::new()),
            history: Arc::new(history),
            config,
        }
    }

    pub fn with_models(mut self, models: Arc<ModelRegistry>) -> Self {
        self.models = models;
        self
    }

    pub fn with_tools(mut self, tools: Arc<dyn ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = history;
        self
    }
}

/// What a completed session produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub answer: String,
    pub tokens: u64,
    pub loops: usize,
}

// ─── Builder ────────────────────────────────────────────────────────────────

pub struct SessionBuilder {
    ctx: EngineContext,
    user_id: String,
    prompt: String,
    question: Option<String>,
    tx: mpsc::Sender<MsgChunk>,
    model_override: Option<String>,
    tools: Option<Vec<ToolDefinition>>,
    content_params: HashMap<String, String>,
    images: Vec<String>,
    replay_history: bool,
    initial_tokens: u64,
}

impl SessionBuilder {
    pub fn new(
        ctx: EngineContext,
        user_id: impl Into<String>,
        prompt: impl Into<String>,
        tx: mpsc::Sender<MsgChunk>,
    ) -> Self {
        Self {
            ctx,
            user_id: user_id.into(),
            prompt: prompt.into(),
            question: None,
            tx,
            model_override: None,
            tools: None,
            content_params: HashMap::new(),
            images: Vec::new(),
            replay_history: true,
            initial_tokens: 0,
        }
    }

    /// Requested model; ignored when the vendor does not know it.
    pub fn model(mut self, model: Option<&str>) -> Self {
        self.model_override = model.map(str::to_string);
        self
    }

    /// Expose only these tools instead of the whole registry.
    pub fn tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Values for `{{key}}` markers in the character prompt.
    pub fn content_params(mut self, params: HashMap<String, String>) -> Self {
        self.content_params = params;
        self
    }

    /// Images attached to the prompt (data urls or http urls).
    pub fn images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    /// Question written to the history record, when it differs from the prompt.
    pub fn question(mut self, question: impl Into<String>) -> Self {
        self.question = Some(question.into());
        self
    }

    /// Skip replaying stored history (planner sub-sessions).
    pub fn without_history(mut self) -> Self {
        self.replay_history = false;
        self
    }

    /// Tokens already spent on behalf of this turn.
    pub fn initial_tokens(mut self, tokens: u64) -> Self {
        self.initial_tokens = tokens;
        self
    }

    pub async fn build(self) -> Session {
        let vendor = self.ctx.client.vendor();
        let model = self
            .ctx
            .models
            .select_model(vendor, self.model_override.as_deref());
        let tools = self
            .tools
            .clone()
            .unwrap_or_else(|| self.ctx.tools.definitions());
        let messages = self.build_history().await;
        let emitter = ChunkEmitter::new(self.tx, &self.ctx.config);

        tracing::debug!(
            user_id = %self.user_id,
            vendor = %vendor,
            model = %model,
            tools = tools.len(),
            history = messages.len().saturating_sub(1),
            "session created"
        );

        Session {
            question: self.question.unwrap_or_else(|| self.prompt.clone()),
            user_id: self.user_id,
            ctx: self.ctx,
            vendor,
            model,
            tools,
            messages,
            tool_messages: Vec::new(),
            emitter,
            tokens: self.initial_tokens,
            loop_num: 0,
        }
    }

    /// Character prompt, replayed history, then the new user message.
    /// A store read failure is logged and the turn proceeds without history.
    async fn build_history(&self) -> Vec<ChatMessage> {
        let config = &self.ctx.config;
        let mut messages = Vec::new();

        if let Some(character) = config.character.as_deref().filter(|c| !c.trim().is_empty()) {
            messages.push(ChatMessage::system(&render_character(
                character,
                &self.content_params,
            )));
        }

        if self.replay_history && config.history_pairs > 0 {
            match self
                .ctx
                .history
                .get_recent(&self.user_id, config.history_pairs)
                .await
            {
                Ok(records) => {
                    let now = chrono::Utc::now().timestamp();
                    for record in records {
                        if record.question.is_empty()
                            || record.answer.is_empty()
                            || record.is_expired(now, config.context_expire_secs)
                        {
                            continue;
                        }
                        messages.push(ChatMessage::user(&record.question));
                        match record.tool_messages() {
                            Ok(tool_messages) => messages.extend(tool_messages),
                            Err(e) => tracing::warn!(
                                user_id = %self.user_id,
                                err = %e,
                                "skipping undecodable tool messages"
                            ),
                        }
                        messages.push(ChatMessage::assistant(&record.answer));
                    }
                }
                Err(e) => {
                    tracing::warn!(user_id = %self.user_id, err = %e, "history unavailable")
                }
            }
        }

        messages.push(ChatMessage::user_with_images(&self.prompt, &self.images));
        messages
    }
}

// ─── Session ────────────────────────────────────────────────────────────────

pub struct Session {
    ctx: EngineContext,
    user_id: String,
    question: String,
    vendor: Vendor,
    model: String,
    tools: Vec<ToolDefinition>,
    messages: Vec<ChatMessage>,
    /// Tool-call and tool-result messages of this turn, persisted with the record.
    tool_messages: Vec<ChatMessage>,
    emitter: ChunkEmitter,
    tokens: u64,
    loop_num: usize,
}

/// What one streaming round produced.
struct Round {
    content: String,
    calls: Vec<ToolCall>,
    tokens: u64,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    pub fn add_tokens(&mut self, tokens: u64) {
        self.tokens += tokens;
    }

    pub fn loops(&self) -> usize {
        self.loop_num
    }

    pub fn answer(&self) -> &str {
        self.emitter.answer()
    }

    pub fn push_user(&mut self, text: &str) {
        self.messages.push(ChatMessage::user(text));
    }

    pub fn push_assistant(&mut self, text: &str) {
        self.messages.push(ChatMessage::assistant(text));
    }

    pub fn outcome(&self) -> SessionOutcome {
        SessionOutcome {
            answer: self.emitter.answer().to_string(),
            tokens: self.tokens,
            loops: self.loop_num,
        }
    }

    /// Drive the session under the session timeout. A fatal error is sent to
    /// the channel as an `Error` chunk before it is returned. The channel
    /// closes when the session is dropped.
    pub async fn run(mut self) -> Result<SessionOutcome> {
        let secs = self.ctx.config.session_timeout_secs;
        let result = match tokio::time::timeout(Duration::from_secs(secs), self.send()).await {
            Ok(r) => r,
            Err(_) => Err(EngineError::DeadlineExceeded { secs }),
        };
        match result {
            Ok(()) => {
                tracing::info!(
                    user_id = %self.user_id,
                    loop_num = self.loop_num,
                    tokens = self.tokens,
                    "session completed"
                );
                Ok(self.outcome())
            }
            Err(e) => {
                self.report(&e).await;
                Err(e)
            }
        }
    }

    /// Render a fatal error for the user, best effort.
    pub async fn report(&mut self, err: &EngineError) {
        tracing::error!(
            user_id = %self.user_id,
            vendor = %self.vendor,
            err = %err,
            "session failed"
        );
        if matches!(err, EngineError::OutboundClosed) {
            return;
        }
        if self.emitter.error(&err.to_string()).await.is_err() {
            tracing::debug!(user_id = %self.user_id, "error chunk dropped, channel closed");
        }
    }

    /// Streaming send loop.
    pub async fn send(&mut self) -> Result<()> {
        loop {
            self.enter_round()?;
            let round = self.stream_round().await?;
            self.tokens += round.tokens;

            if round.calls.is_empty() {
                return self.finalize().await;
            }

            let executed = self.execute(&round.calls, true).await?;
            if executed.is_empty() {
                tracing::warn!(
                    user_id = %self.user_id,
                    calls = round.calls.len(),
                    "no tool produced a result, finishing turn"
                );
                return self.finalize().await;
            }
            self.splice(&round.content, executed);
        }
    }

    /// Single-shot send. Tool calls in the reply are executed once and their
    /// results appended; the reply text is returned as is. Does not count
    /// toward the round bound.
    pub async fn sync_send(&mut self) -> Result<String> {
        let completion = self
            .ctx
            .client
            .complete(&self.model, &self.messages, &self.tools)
            .await?;
        self.tokens += completion.total_tokens;

        if !completion.tool_calls.is_empty() {
            let calls = with_call_ids(completion.tool_calls);
            let executed = self.execute(&calls, false).await?;
            if !executed.is_empty() {
                self.splice(&completion.content, executed);
            }
        }
        Ok(completion.content)
    }

    /// Send a complete text as the final answer and persist it.
    pub async fn deliver(&mut self, text: &str) -> Result<()> {
        self.emitter.direct_send(text).await?;
        self.finalize().await
    }

    fn enter_round(&mut self) -> Result<()> {
        if self.loop_num >= self.ctx.config.most_loop {
            return Err(EngineError::TooManyLoops {
                limit: self.ctx.config.most_loop,
            });
        }
        self.loop_num += 1;
        Ok(())
    }

    async fn stream_round(&mut self) -> Result<Round> {
        tracing::debug!(
            user_id = %self.user_id,
            vendor = %self.vendor,
            loop_num = self.loop_num,
            messages = self.messages.len(),
            "streaming round"
        );
        let mut stream = self
            .ctx
            .client
            .stream(&self.model, &self.messages, &self.tools)
            .await?;

        let mut acc = ToolCallAccumulator::new();
        let mut content = String::new();
        let mut tokens = 0;

        while let Some(delta) = stream.next_delta().await {
            let delta = delta?;
            if let Some(total) = delta.total_tokens {
                tokens = total;
            }
            for fragment in &delta.tool_calls {
                match acc.push(fragment) {
                    Err(e) if e.is_fatal() => return Err(e),
                    _ => {}
                }
            }
            if let Some(text) = delta.content.as_deref().filter(|t| !t.is_empty()) {
                content.push_str(text);
                self.emitter.push(text).await?;
            }
        }

        Ok(Round {
            content,
            calls: acc.finish(),
            tokens,
        })
    }

    async fn execute(&mut self, calls: &[ToolCall], notify: bool) -> Result<Vec<ExecutedCall>> {
        let notify = (notify && self.ctx.config.send_tool_info).then_some(&mut self.emitter);
        execute_tool_calls(
            calls,
            self.ctx.tools.as_ref(),
            &self.tools,
            self.ctx.config.retry_times,
            notify,
        )
        .await
    }

    /// Append the assistant turn carrying the executed calls, then one
    /// tool-result message per call.
    fn splice(&mut self, content: &str, executed: Vec<ExecutedCall>) {
        let calls: Vec<ToolCall> = executed.iter().map(|e| e.call.clone()).collect();
        let content = Some(content).filter(|c| !c.is_empty());
        let assistant = ChatMessage::assistant_with_tool_calls(content, calls);
        self.messages.push(assistant.clone());
        self.tool_messages.push(assistant);
        for e in executed {
            let result = ChatMessage::tool_result(&e.call.id, &e.call.function.name, &e.result);
            self.messages.push(result.clone());
            self.tool_messages.push(result);
        }
    }

    /// Flush the emitter and write the history record.
    async fn finalize(&mut self) -> Result<()> {
        self.emitter.finish().await?;
        let record = AqRecord::new(
            &self.question,
            self.emitter.answer(),
            &self.tool_messages,
            self.tokens,
        );
        if let Err(e) = self.ctx.history.insert(&self.user_id, record).await {
            tracing::error!(user_id = %self.user_id, err = %e, "failed to store history record");
        }
        Ok(())
    }
}

/// Single-shot replies from some vendors carry no call ids.
fn with_call_ids(calls: Vec<ToolCall>) -> Vec<ToolCall> {
    calls
        .into_iter()
        .map(|mut c| {
            if c.id.is_empty() {
                c.id = format!("call_{}", uuid::Uuid::new_v4().simple());
            }
            c
        })
        .collect()
}
