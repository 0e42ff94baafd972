//! End-to-end conversations against mock vendor endpoints.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parley_agent::history::{HistoryStore, SqliteHistoryStore};
use parley_agent::llm::{provider_for, LlmClient, ModelRegistry, Vendor};
use parley_agent::prompt::PromptTemplates;
use parley_agent::task_planner::TaskPlanner;
use parley_agent::tools::{AgentCatalog, StaticToolRegistry, ToolClient};
use parley_agent::types::{utf16_len, ChunkKind, MsgChunk, ToolDefinition};
use parley_agent::{EngineContext, EngineError, SessionBuilder};
use parley_core::config::{EngineConfig, SamplingConfig};
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use wiremock::matchers::{body_string_contains, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ─── Fixtures ───────────────────────────────────────────────────────────────

fn config() -> EngineConfig {
    EngineConfig {
        retry_times: 1,
        session_timeout_secs: 10,
        task_timeout_secs: 20,
        http_timeout_secs: 5,
        ..EngineConfig::default()
    }
}

fn context(vendor: Vendor, server: &MockServer, config: EngineConfig) -> EngineContext {
    let models = ModelRegistry::builtin();
    let provider = provider_for(vendor, Some(&server.uri()), Some("test-key"), &models);
    let client = LlmClient::new(provider, SamplingConfig::default(), &config).unwrap();
    EngineContext::new(Arc::new(client), config).with_models(Arc::new(models))
}

fn sse(chunks: &[Value]) -> ResponseTemplate {
    let mut body = String::new();
    for c in chunks {
        body.push_str(&format!("data: {}\n\n", c));
    }
    body.push_str("data: [DONE]\n\n");
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

fn openai_text(text: &str) -> Value {
    json!({"choices": [{"index": 0, "delta": {"content": text}}]})
}

async fn collect(mut rx: mpsc::Receiver<MsgChunk>) -> Vec<MsgChunk> {
    let mut out = Vec::new();
    while let Some(chunk) = rx.recv().await {
        out.push(chunk);
    }
    out
}

fn answer_of(chunks: &[MsgChunk]) -> String {
    chunks
        .iter()
        .filter(|c| c.kind == ChunkKind::Answer)
        .map(|c| c.content.as_str())
        .collect()
}

struct CountingWeather {
    calls: AtomicUsize,
}

#[async_trait]
impl ToolClient for CountingWeather {
    async fn exec_tool(&self, _name: &str, args: &Map<String, Value>) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let city = args.get("city").and_then(Value::as_str).unwrap_or("somewhere");
        Ok(format!("{}: sunny, 21C", city))
    }
}

fn weather_tools() -> (Arc<CountingWeather>, StaticToolRegistry) {
    let tool = Arc::new(CountingWeather {
        calls: AtomicUsize::new(0),
    });
    let registry = StaticToolRegistry::new().with(
        ToolDefinition::function(
            "get_weather",
            "Current weather for a city",
            json!({"type": "object", "properties": {"city": {"type": "string"}}}),
        ),
        tool.clone(),
    );
    (tool, registry)
}

// ─── Scenarios ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn what_is_two_plus_two_is_one_round_and_one_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(sse(&[
            openai_text("2 + 2 "),
            openai_text("= 4"),
            json!({"choices": [], "usage": {"total_tokens": 18}}),
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteHistoryStore::open(&dir.path().join("history.db")).unwrap());
    let ctx = context(Vendor::DeepSeek, &server, config()).with_history(store.clone());

    let (tx, rx) = mpsc::channel(16);
    let reader = tokio::spawn(collect(rx));
    let outcome = SessionBuilder::new(ctx, "alice", "what's 2+2", tx)
        .build()
        .await
        .run()
        .await
        .unwrap();
    // the channel closes once the session is gone
    let chunks = reader.await.unwrap();

    assert_eq!(outcome.loops, 1);
    assert_eq!(outcome.tokens, 18);
    assert_eq!(answer_of(&chunks), "2 + 2 = 4");
    assert!(chunks.last().unwrap().finished);

    let records = store.get_recent("alice", 10).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].answer, "2 + 2 = 4");
}

#[tokio::test]
async fn gemini_weather_tool_takes_two_rounds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"/models/.+:streamGenerateContent$"))
        .and(body_string_contains("functionResponse"))
        .respond_with(sse(&[json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Sunny in Paris, 21C."}]}}],
            "usageMetadata": {"totalTokenCount": 30}
        })]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"/models/.+:streamGenerateContent$"))
        .respond_with(sse(&[json!({
            "candidates": [{"content": {"role": "model", "parts": [
                {"text": "thinking", "thought": true},
                {"functionCall": {"name": "get_weather", "args": {"city": "Paris"}}}
            ]}}],
            "usageMetadata": {"totalTokenCount": 12}
        })]))
        .expect(1)
        .mount(&server)
        .await;

    let (tool, registry) = weather_tools();
    let store = Arc::new(SqliteHistoryStore::open_in_memory().unwrap());
    let ctx = context(Vendor::Gemini, &server, config())
        .with_tools(Arc::new(registry))
        .with_history(store.clone());

    let (tx, rx) = mpsc::channel(16);
    let reader = tokio::spawn(collect(rx));
    let outcome = SessionBuilder::new(ctx, "bob", "weather in Paris?", tx)
        .build()
        .await
        .run()
        .await
        .unwrap();
    let chunks = reader.await.unwrap();

    assert_eq!(outcome.loops, 2);
    assert_eq!(outcome.tokens, 42);
    assert_eq!(tool.calls.load(Ordering::SeqCst), 1);
    assert_eq!(answer_of(&chunks), "Sunny in Paris, 21C.");

    let requests = server.received_requests().await.unwrap();
    let second = String::from_utf8_lossy(&requests[1].body).to_string();
    assert!(second.contains("Paris: sunny, 21C"));

    let record = &store.get_recent("bob", 1).await.unwrap()[0];
    assert_eq!(record.tool_messages().unwrap().len(), 2);
}

#[tokio::test]
async fn ollama_streams_newline_delimited_json() {
    let server = MockServer::start().await;
    let body = [
        json!({"message": {"role": "assistant", "content": "Hel"}, "done": false}),
        json!({"message": {"role": "assistant", "content": "lo"}, "done": false}),
        json!({"message": {"role": "assistant", "content": ""}, "done": true,
               "prompt_eval_count": 3, "eval_count": 2}),
    ]
    .iter()
    .map(Value::to_string)
    .collect::<Vec<_>>()
    .join("\n");
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context(Vendor::Ollama, &server, config());
    let (tx, rx) = mpsc::channel(16);
    let reader = tokio::spawn(collect(rx));
    let outcome = SessionBuilder::new(ctx, "carol", "say hello", tx)
        .model(Some("llama3.2:latest"))
        .build()
        .await
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.answer, "Hello");
    assert_eq!(outcome.tokens, 5);
    assert_eq!(answer_of(&reader.await.unwrap()), "Hello");
}

#[tokio::test]
async fn endless_tool_calls_stop_at_the_loop_bound() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(sse(&[json!({"choices": [{"index": 0, "delta": {"tool_calls": [{
            "index": 0, "id": "call_loop", "type": "function",
            "function": {"name": "get_weather", "arguments": "{\"city\":\"Oslo\"}"}
        }]}}]})]))
        .mount(&server)
        .await;

    let (tool, registry) = weather_tools();
    let ctx = context(Vendor::OpenAi, &server, config()).with_tools(Arc::new(registry));
    let (tx, rx) = mpsc::channel(64);
    let reader = tokio::spawn(collect(rx));
    let err = SessionBuilder::new(ctx, "dave", "loop", tx)
        .build()
        .await
        .run()
        .await
        .unwrap_err();
    let chunks = reader.await.unwrap();

    assert!(matches!(err, EngineError::TooManyLoops { limit: 5 }));
    assert_eq!(tool.calls.load(Ordering::SeqCst), 5);
    assert_eq!(server.received_requests().await.unwrap().len(), 5);
    let last = chunks.last().unwrap();
    assert_eq!(last.kind, ChunkKind::Error);
    assert_eq!(last.content, "too many loops: exceeded limit of 5");
}

#[tokio::test]
async fn long_answers_respect_the_platform_cap() {
    let server = MockServer::start().await;
    let piece = "word ".repeat(20);
    let deltas: Vec<Value> = (0..100).map(|_| openai_text(&piece)).collect();
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(sse(&deltas))
        .mount(&server)
        .await;

    let ctx = context(Vendor::DeepSeek, &server, config());
    let (tx, rx) = mpsc::channel(64);
    let reader = tokio::spawn(collect(rx));
    let outcome = SessionBuilder::new(ctx, "erin", "write a lot", tx)
        .build()
        .await
        .run()
        .await
        .unwrap();
    let chunks = reader.await.unwrap();

    assert_eq!(outcome.answer.len(), 10_000);
    assert_eq!(answer_of(&chunks), outcome.answer);
    assert!(chunks.len() > 2);
    assert_eq!(chunks[0].send_len_hint, 30);

    let mut message_units = 0;
    for chunk in &chunks {
        message_units += utf16_len(&chunk.content);
        assert!(message_units <= 3896);
        if chunk.finished {
            message_units = 0;
        }
    }
}

#[tokio::test]
async fn planner_with_empty_plan_answers_directly() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "It is 4."}}],
            "usage": {"total_tokens": 8}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context(Vendor::Vol, &server, config());
    let planner = TaskPlanner::new(ctx, Arc::new(AgentCatalog::new()), PromptTemplates::default());
    let (tx, rx) = mpsc::channel(16);
    let reader = tokio::spawn(collect(rx));
    let outcome = planner.run("frank", "what's 2+2", tx).await.unwrap();
    drop(planner);
    let chunks = reader.await.unwrap();

    assert_eq!(outcome.answer, "It is 4.");
    assert_eq!(outcome.loops, 0);
    assert_eq!(answer_of(&chunks), "It is 4.");
}
