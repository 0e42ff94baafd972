//! Tests for the session loop against a mock upstream.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use wiremock::MockServer;

use super::*;
use crate::history::{AqRecord, HistoryStore};
use crate::test_support::*;
use crate::tools::StaticToolRegistry;
use crate::types::{ChunkKind, Role};

fn answer_text(chunks: &[MsgChunk]) -> String {
    chunks
        .iter()
        .filter(|c| c.kind == ChunkKind::Answer)
        .map(|c| c.content.as_str())
        .collect()
}

#[tokio::test]
async fn test_plain_answer_is_streamed_and_recorded() {
    let server = MockServer::start().await;
    stream_mock("what's 2+2")
        .respond_with(sse_response(&[content_chunk("4"), usage_chunk(12)]))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context(&server, test_config());
    let (tx, mut rx) = channel();
    let session = SessionBuilder::new(ctx.clone(), "u1", "what's 2+2", tx)
        .build()
        .await;
    let outcome = session.run().await.unwrap();

    assert_eq!(outcome.answer, "4");
    assert_eq!(outcome.tokens, 12);
    assert_eq!(outcome.loops, 1);

    let chunks = drain(&mut rx);
    assert_eq!(answer_text(&chunks), "4");
    assert!(chunks.last().unwrap().finished);

    let records = ctx.history.get_recent("u1", 10).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].question, "what's 2+2");
    assert_eq!(records[0].answer, "4");
    assert_eq!(records[0].token, 12);
    assert_eq!(records[0].tool_messages, "");
}

#[tokio::test]
async fn test_tool_round_then_answer() {
    let server = MockServer::start().await;
    // second round carries the tool result; mounted first so it wins once it matches
    stream_mock(r#""tool_call_id":"call_1""#)
        .respond_with(sse_response(&[
            content_chunk("It is sunny in Paris."),
            usage_chunk(40),
        ]))
        .expect(1)
        .mount(&server)
        .await;
    let mut first = tool_call_chunks("call_1", "get_weather", &[r#"{"city""#, r#":"Paris"}"#]);
    first.push(usage_chunk(25));
    stream_mock("weather in Paris")
        .respond_with(sse_response(&first))
        .expect(1)
        .mount(&server)
        .await;

    let tool = FixedTool::new("sunny, 21C");
    let ctx = context(&server, test_config())
        .with_tools(Arc::new(weather_registry(Arc::clone(&tool))));
    let (tx, mut rx) = channel();
    let session = SessionBuilder::new(ctx.clone(), "u1", "weather in Paris?", tx)
        .build()
        .await;
    let outcome = session.run().await.unwrap();

    assert_eq!(outcome.answer, "It is sunny in Paris.");
    assert_eq!(outcome.tokens, 65);
    assert_eq!(outcome.loops, 2);
    assert_eq!(tool.calls(), 1);
    let seen = tool.seen.lock().unwrap();
    assert_eq!(seen[0].get("city").and_then(|v| v.as_str()), Some("Paris"));
    drop(seen);

    // tool notices are off by default
    let chunks = drain(&mut rx);
    assert!(chunks.iter().all(|c| c.kind == ChunkKind::Answer));

    let records = ctx.history.get_recent("u1", 10).await.unwrap();
    let tool_messages = records[0].tool_messages().unwrap();
    assert_eq!(tool_messages.len(), 2);
    assert_eq!(tool_messages[0].role, Role::Assistant);
    assert_eq!(tool_messages[0].tool_calls.as_ref().unwrap()[0].id, "call_1");
    assert_eq!(tool_messages[1].role, Role::Tool);
    assert_eq!(tool_messages[1].text(), "sunny, 21C");
}

#[tokio::test]
async fn test_tool_notice_when_enabled() {
    let server = MockServer::start().await;
    stream_mock("call_9")
        .respond_with(sse_response(&[content_chunk("done")]))
        .mount(&server)
        .await;
    stream_mock("notice please")
        .respond_with(sse_response(&tool_call_chunks(
            "call_9",
            "get_weather",
            &[r#"{"city":"Oslo"}"#],
        )))
        .mount(&server)
        .await;

    let config = EngineConfig {
        send_tool_info: true,
        ..test_config()
    };
    let ctx = context(&server, config)
        .with_tools(Arc::new(weather_registry(FixedTool::new("snow"))));
    let (tx, mut rx) = channel();
    SessionBuilder::new(ctx, "u1", "notice please", tx)
        .build()
        .await
        .run()
        .await
        .unwrap();

    let chunks = drain(&mut rx);
    let notice = chunks
        .iter()
        .find(|c| c.kind == ChunkKind::Notice)
        .expect("tool notice sent");
    assert!(notice.content.contains("function: get_weather"));
    assert!(notice.content.contains("result: snow"));
}

#[tokio::test]
async fn test_too_many_loops() {
    let server = MockServer::start().await;
    stream_mock("loop forever")
        .respond_with(sse_response(&tool_call_chunks(
            "call_x",
            "get_weather",
            &[r#"{"city":"Rome"}"#],
        )))
        .mount(&server)
        .await;

    let config = EngineConfig {
        most_loop: 2,
        ..test_config()
    };
    let tool = FixedTool::new("rain");
    let ctx = context(&server, config).with_tools(Arc::new(weather_registry(Arc::clone(&tool))));
    let (tx, mut rx) = channel();
    let err = SessionBuilder::new(ctx.clone(), "u1", "loop forever", tx)
        .build()
        .await
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::TooManyLoops { limit: 2 }));
    assert_eq!(tool.calls(), 2);
    let chunks = drain(&mut rx);
    let last = chunks.last().unwrap();
    assert_eq!(last.kind, ChunkKind::Error);
    assert!(last.content.contains("too many loops"));
    assert!(ctx.history.get_recent("u1", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_tools_end_the_turn() {
    let server = MockServer::start().await;
    stream_mock("broken tool")
        .respond_with(sse_response(&[
            content_chunk("Let me check. "),
            tool_call_chunks("call_b", "get_weather", &[r#"{"city":"Lima"}"#])[0].clone(),
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let registry = StaticToolRegistry::new().with(weather_definition(), Arc::new(BrokenTool));
    let ctx = context(&server, test_config()).with_tools(Arc::new(registry));
    let (tx, _rx) = channel();
    let outcome = SessionBuilder::new(ctx.clone(), "u1", "broken tool", tx)
        .build()
        .await
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.answer, "Let me check. ");
    assert_eq!(outcome.loops, 1);
    assert_eq!(ctx.history.get_recent("u1", 1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_tool_outside_session_subset_is_not_run() {
    let server = MockServer::start().await;
    stream_mock("subset")
        .respond_with(sse_response(&tool_call_chunks(
            "call_s",
            "get_weather",
            &[r#"{"city":"Kyiv"}"#],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let tool = FixedTool::new("cloudy");
    let ctx = context(&server, test_config())
        .with_tools(Arc::new(weather_registry(Arc::clone(&tool))));
    let (tx, _rx) = channel();
    SessionBuilder::new(ctx, "u1", "subset", tx)
        .tools(Vec::new())
        .build()
        .await
        .run()
        .await
        .unwrap();

    assert_eq!(tool.calls(), 0);
}

#[tokio::test]
async fn test_upstream_error_is_reported() {
    let server = MockServer::start().await;
    stream_mock("hello")
        .respond_with(wiremock::ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let ctx = context(&server, test_config());
    let (tx, mut rx) = channel();
    let err = SessionBuilder::new(ctx, "u1", "hello", tx)
        .build()
        .await
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Upstream { status: 401, .. }));
    let chunks = drain(&mut rx);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].kind, ChunkKind::Error);
}

#[tokio::test]
async fn test_history_replay_and_character() {
    let server = MockServer::start().await;
    let config = EngineConfig {
        character: Some("You are {{name}}.".into()),
        context_expire_secs: 3600,
        ..test_config()
    };
    let ctx = context(&server, config);

    let tool_messages = vec![
        ChatMessage::assistant_with_tool_calls(
            None,
            vec![ToolCall::new("call_1", "get_weather", r#"{"city":"Paris"}"#)],
        ),
        ChatMessage::tool_result("call_1", "get_weather", "sunny"),
    ];
    let stale = AqRecord {
        create_time: chrono::Utc::now().timestamp() - 7200,
        ..AqRecord::new("old question", "old answer", &[], 1)
    };
    ctx.history.insert("u1", stale).await.unwrap();
    ctx.history
        .insert("u1", AqRecord::new("", "orphan answer", &[], 1))
        .await
        .unwrap();
    ctx.history
        .insert("u1", AqRecord::new("weather?", "sunny", &tool_messages, 9))
        .await
        .unwrap();

    let mut params = HashMap::new();
    params.insert("name".to_string(), "Parley".to_string());
    let (tx, _rx) = channel();
    let session = SessionBuilder::new(ctx.clone(), "u1", "and tomorrow?", tx)
        .content_params(params)
        .build()
        .await;

    let texts: Vec<(Role, String)> = session
        .messages()
        .iter()
        .map(|m| (m.role, m.text()))
        .collect();
    assert_eq!(texts[0], (Role::System, "You are Parley.".to_string()));
    assert_eq!(texts[1], (Role::User, "weather?".to_string()));
    assert_eq!(texts[2].0, Role::Assistant);
    assert_eq!(texts[3], (Role::Tool, "sunny".to_string()));
    assert_eq!(texts[4], (Role::Assistant, "sunny".to_string()));
    assert_eq!(texts[5], (Role::User, "and tomorrow?".to_string()));
    assert_eq!(texts.len(), 6);

    let (tx, _rx) = channel();
    let bare = SessionBuilder::new(ctx, "u1", "fresh", tx)
        .without_history()
        .build()
        .await;
    assert_eq!(bare.messages().len(), 2);
}

#[tokio::test]
async fn test_model_override_falls_back_to_default() {
    let server = MockServer::start().await;
    let ctx = context(&server, test_config());

    let (tx, _rx) = channel();
    let session = SessionBuilder::new(ctx.clone(), "u1", "hi", tx)
        .model(Some("no-such-model"))
        .build()
        .await;
    assert_eq!(session.model(), "deepseek-chat");

    let (tx, _rx) = channel();
    let session = SessionBuilder::new(ctx, "u1", "hi", tx)
        .model(Some("deepseek-reasoner"))
        .images(vec!["https://example.com/cat.png".into()])
        .build()
        .await;
    assert_eq!(session.model(), "deepseek-reasoner");
    let last = session.messages().last().unwrap();
    assert_eq!(last.content.as_ref().unwrap().images().len(), 1);
}

#[tokio::test]
async fn test_sync_send_executes_tools_once() {
    let server = MockServer::start().await;
    sync_mock("sync weather")
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"index": 0, "message": {
                "role": "assistant",
                "content": "checking",
                "tool_calls": [{"type": "function", "function": {
                    "name": "get_weather", "arguments": "{\"city\":\"Bern\"}"
                }}]
            }}],
            "usage": {"total_tokens": 15}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tool = FixedTool::new("foggy");
    let ctx = context(&server, test_config())
        .with_tools(Arc::new(weather_registry(Arc::clone(&tool))));
    let (tx, _rx) = channel();
    let mut session = SessionBuilder::new(ctx, "u1", "sync weather", tx)
        .initial_tokens(5)
        .build()
        .await;

    let reply = session.sync_send().await.unwrap();
    assert_eq!(reply, "checking");
    assert_eq!(session.tokens(), 20);
    assert_eq!(session.loops(), 0);
    assert_eq!(tool.calls(), 1);

    let messages = session.messages();
    let assistant = &messages[messages.len() - 2];
    let call_id = &assistant.tool_calls.as_ref().unwrap()[0].id;
    assert!(call_id.starts_with("call_"));
    assert_eq!(messages.last().unwrap().tool_call_id.as_deref(), Some(call_id.as_str()));
}

#[tokio::test]
async fn test_deliver_sends_and_records() {
    let server = MockServer::start().await;
    let ctx = context(&server, test_config());
    let (tx, mut rx) = channel();
    let mut session = SessionBuilder::new(ctx.clone(), "u1", "prompt text", tx)
        .question("what the user asked")
        .build()
        .await;

    session.deliver("no plan needed").await.unwrap();

    let chunks = drain(&mut rx);
    assert_eq!(answer_text(&chunks), "no plan needed");
    assert!(chunks.iter().all(|c| c.finished));
    let records = ctx.history.get_recent("u1", 1).await.unwrap();
    assert_eq!(records[0].question, "what the user asked");
    assert_eq!(records[0].answer, "no plan needed");
}

#[tokio::test]
async fn test_undecodable_tool_messages_keep_the_pair() {
    let server = MockServer::start().await;
    let ctx = context(&server, test_config());
    let record = AqRecord {
        tool_messages: "[{not json".to_string(),
        ..AqRecord::new("weather?", "sunny", &[], 3)
    };
    ctx.history.insert("u1", record).await.unwrap();

    let (tx, _rx) = channel();
    let session = SessionBuilder::new(ctx, "u1", "and tomorrow?", tx)
        .build()
        .await;

    let texts: Vec<(Role, String)> = session
        .messages()
        .iter()
        .map(|m| (m.role, m.text()))
        .collect();
    assert_eq!(
        texts,
        vec![
            (Role::User, "weather?".to_string()),
            (Role::Assistant, "sunny".to_string()),
            (Role::User, "and tomorrow?".to_string()),
        ]
    );
}

/// Reads always fail; writes are accepted and counted.
struct UnreadableStore {
    inserts: std::sync::Mutex<usize>,
}

#[async_trait]
impl HistoryStore for UnreadableStore {
    async fn get_recent(&self, _user_id: &str, _limit: usize) -> anyhow::Result<Vec<AqRecord>> {
        anyhow::bail!("database is locked")
    }

    async fn insert(&self, _user_id: &str, _record: AqRecord) -> anyhow::Result<()> {
        if let Ok(mut n) = self.inserts.lock() {
            *n += 1;
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_history_read_failure_does_not_block_the_turn() {
    let server = MockServer::start().await;
    stream_mock("still there?")
        .respond_with(sse_response(&[content_chunk("yes"), usage_chunk(3)]))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(UnreadableStore {
        inserts: std::sync::Mutex::new(0),
    });
    let ctx = context(&server, test_config()).with_history(store.clone());
    let (tx, _rx) = channel();
    let session = SessionBuilder::new(ctx, "u1", "still there?", tx)
        .build()
        .await;
    assert_eq!(session.messages().len(), 1);

    let outcome = session.run().await.unwrap();
    assert_eq!(outcome.answer, "yes");
    assert_eq!(*store.inserts.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_slow_upstream_hits_session_deadline() {
    let server = MockServer::start().await;
    stream_mock("slow")
        .respond_with(
            sse_response(&[content_chunk("too late")]).set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = EngineConfig {
        session_timeout_secs: 1,
        ..test_config()
    };
    let ctx = context(&server, config);
    let (tx, mut rx) = channel();
    let err = SessionBuilder::new(ctx.clone(), "u1", "slow", tx)
        .build()
        .await
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::DeadlineExceeded { secs: 1 }));
    let chunks = drain(&mut rx);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].kind, ChunkKind::Error);
    assert!(ctx.history.get_recent("u1", 1).await.unwrap().is_empty());
}

#[test]
fn test_parse_arguments() {
    use super::execution::parse_arguments;
    assert!(parse_arguments("").unwrap().is_empty());
    assert_eq!(parse_arguments(r#"{"a":1}"#).unwrap().len(), 1);
    assert!(parse_arguments("[1,2]").is_err());
    assert!(parse_arguments("{broken").is_err());
}
