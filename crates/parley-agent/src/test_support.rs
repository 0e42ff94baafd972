//! Shared fixtures for engine unit tests: a DeepSeek-shaped mock upstream,
//! canned tools and channel helpers.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parley_core::config::{EngineConfig, SamplingConfig};
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use crate::history::MemoryHistoryStore;
use crate::llm::{provider_for, LlmClient, ModelRegistry, Vendor};
use crate::session::EngineContext;
use crate::tools::{StaticToolRegistry, ToolClient};
use crate::types::{MsgChunk, ToolDefinition};

pub(crate) fn test_config() -> EngineConfig {
    EngineConfig {
        retry_times: 1,
        session_timeout_secs: 10,
        task_timeout_secs: 20,
        http_timeout_secs: 5,
        ..EngineConfig::default()
    }
}

pub(crate) fn context(server: &MockServer, config: EngineConfig) -> EngineContext {
    let models = ModelRegistry::builtin();
    let provider = provider_for(Vendor::DeepSeek, Some(&server.uri()), Some("test-key"), &models);
    let client = LlmClient::new(provider, SamplingConfig::default(), &config)
        .expect("client builds");
    EngineContext::new(Arc::new(client), config)
        .with_models(Arc::new(models))
        .with_history(Arc::new(MemoryHistoryStore::new(10)))
}

pub(crate) fn channel() -> (mpsc::Sender<MsgChunk>, mpsc::Receiver<MsgChunk>) {
    mpsc::channel(256)
}

pub(crate) fn drain(rx: &mut mpsc::Receiver<MsgChunk>) -> Vec<MsgChunk> {
    let mut out = Vec::new();
    while let Ok(chunk) = rx.try_recv() {
        out.push(chunk);
    }
    out
}

// ─── Upstream bodies ────────────────────────────────────────────────────────

pub(crate) fn sse_body(chunks: &[Value]) -> String {
    let mut body = String::new();
    for c in chunks {
        body.push_str(&format!("data: {}\n\n", c));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

pub(crate) fn content_chunk(text: &str) -> Value {
    json!({"choices": [{"index": 0, "delta": {"content": text}}]})
}

pub(crate) fn usage_chunk(total: u64) -> Value {
    json!({"choices": [], "usage": {"total_tokens": total}})
}

/// A tool call streamed as a name fragment followed by argument pieces.
pub(crate) fn tool_call_chunks(id: &str, name: &str, arg_pieces: &[&str]) -> Vec<Value> {
    let mut out = vec![json!({"choices": [{"index": 0, "delta": {"tool_calls": [
        {"index": 0, "id": id, "type": "function", "function": {"name": name, "arguments": ""}}
    ]}}]})];
    for piece in arg_pieces {
        out.push(json!({"choices": [{"index": 0, "delta": {"tool_calls": [
            {"index": 0, "function": {"arguments": piece}}
        ]}}]}));
    }
    out
}

pub(crate) fn sse_response(chunks: &[Value]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(sse_body(chunks), "text/event-stream")
}

pub(crate) fn completion_response(content: &str, total_tokens: u64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}],
        "usage": {"total_tokens": total_tokens}
    }))
}

fn is_streaming(req: &Request) -> bool {
    String::from_utf8_lossy(&req.body).contains(r#""stream":true"#)
}

/// Streaming call whose body contains `needle`.
pub(crate) fn stream_mock(needle: &str) -> wiremock::MockBuilder {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(is_streaming)
        .and(body_string_contains(needle))
}

/// Single-shot call whose body contains `needle`.
pub(crate) fn sync_mock(needle: &str) -> wiremock::MockBuilder {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(|req: &Request| !is_streaming(req))
        .and(body_string_contains(needle))
}

// ─── Tools ──────────────────────────────────────────────────────────────────

/// Returns a fixed result and records the arguments it saw.
pub(crate) struct FixedTool {
    pub result: String,
    pub seen: std::sync::Mutex<Vec<Map<String, Value>>>,
}

impl FixedTool {
    pub fn new(result: &str) -> Arc<Self> {
        Arc::new(Self {
            result: result.to_string(),
            seen: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ToolClient for FixedTool {
    async fn exec_tool(&self, _name: &str, args: &Map<String, Value>) -> Result<String> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(args.clone());
        }
        Ok(self.result.clone())
    }
}

/// Always fails.
pub(crate) struct BrokenTool;

#[async_trait]
impl ToolClient for BrokenTool {
    async fn exec_tool(&self, _name: &str, _args: &Map<String, Value>) -> Result<String> {
        anyhow::bail!("backend unavailable")
    }
}

pub(crate) fn weather_definition() -> ToolDefinition {
    ToolDefinition::function(
        "get_weather",
        "Current weather for a city",
        json!({"type": "object", "properties": {"city": {"type": "string"}}, "required": ["city"]}),
    )
}

pub(crate) fn weather_registry(tool: Arc<FixedTool>) -> StaticToolRegistry {
    StaticToolRegistry::new().with(weather_definition(), tool)
}
