//! OpenAI-compatible API: shared encode/decode helpers and the OpenAI / Aliyun provider.
//!
//! DeepSeek, OpenRouter and Vol speak the same `/chat/completions` protocol and
//! only differ in how message content is encoded, so they reuse these helpers.

use serde_json::{json, Map, Value};

use super::{
    error_message, sse_data, ChatRequest, Completion, LineEvent, Provider, StreamDelta,
    ToolCallDelta, Vendor,
};
use crate::error::{EngineError, Result};
use crate::types::{ChatMessage, ContentPart, FunctionCall, MessageContent, Role, ToolCall};

// ─── Encoding ───────────────────────────────────────────────────────────────

/// Encode one message; `content` decides the vendor's content shape.
/// A `None` content leaves the field out entirely.
pub(super) fn encode_message(msg: &ChatMessage, content: Option<Value>) -> Value {
    let mut out = Map::new();
    out.insert("role".into(), json!(msg.role.as_str()));
    if let Some(c) = content {
        out.insert("content".into(), c);
    }
    if let Some(calls) = &msg.tool_calls {
        if !calls.is_empty() {
            out.insert("tool_calls".into(), json!(calls));
        }
    }
    if let Some(id) = &msg.tool_call_id {
        out.insert("tool_call_id".into(), json!(id));
    }
    Value::Object(out)
}

/// Parts in the OpenAI wire shape (`text` / `image_url`).
pub(super) fn encode_parts(parts: &[ContentPart]) -> Value {
    json!(parts)
}

/// Request body shared by every OpenAI-compatible vendor.
pub(super) fn encode_body(request: &ChatRequest<'_>, messages: Vec<Value>, stream: bool) -> Value {
    let s = request.sampling;
    let mut body = json!({
        "model": request.model,
        "messages": messages,
        "max_tokens": s.max_tokens,
        "temperature": s.temperature,
        "top_p": s.top_p,
        "frequency_penalty": s.frequency_penalty,
        "presence_penalty": s.presence_penalty,
    });
    if !s.stop.is_empty() {
        body["stop"] = json!(s.stop);
    }
    if !request.tools.is_empty() {
        body["tools"] = json!(request.tools);
    }
    if stream {
        body["stream"] = json!(true);
        body["stream_options"] = json!({ "include_usage": true });
    }
    body
}

// ─── Decoding ───────────────────────────────────────────────────────────────

/// Decode one SSE line of an OpenAI-compatible stream.
pub(super) fn decode_sse_line(line: &str) -> LineEvent {
    let Some(data) = sse_data(line) else {
        return LineEvent::Skip;
    };
    if data == "[DONE]" {
        return LineEvent::Done;
    }
    let chunk: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(err = %e, "skipping undecodable stream line");
            return LineEvent::Skip;
        }
    };
    decode_chunk(&chunk)
}

/// Decode one parsed `chat.completion.chunk` object.
pub(super) fn decode_chunk(chunk: &Value) -> LineEvent {
    if let Some(msg) = error_message(chunk) {
        return LineEvent::Failed(msg);
    }

    let mut delta = StreamDelta {
        total_tokens: chunk
            .get("usage")
            .and_then(|u| u.get("total_tokens"))
            .and_then(Value::as_u64),
        ..Default::default()
    };

    if let Some(d) = chunk
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .and_then(|c| c.get("delta"))
    {
        // reasoning_content is the model's scratchpad, not part of the answer
        if let Some(text) = d.get("content").and_then(Value::as_str) {
            if !text.is_empty() {
                delta.content = Some(text.to_string());
            }
        }
        if let Some(calls) = d.get("tool_calls").and_then(Value::as_array) {
            delta.tool_calls = calls.iter().map(decode_tool_call_delta).collect();
        }
    }

    if delta.is_empty() {
        LineEvent::Skip
    } else {
        LineEvent::Delta(delta)
    }
}

fn decode_tool_call_delta(tc: &Value) -> ToolCallDelta {
    let func = tc.get("function");
    let str_field = |v: Option<&Value>| {
        v.and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    ToolCallDelta {
        index: tc.get("index").and_then(Value::as_u64).map(|i| i as u32),
        id: str_field(tc.get("id")),
        call_type: str_field(tc.get("type")),
        name: str_field(func.and_then(|f| f.get("name"))),
        arguments: str_field(func.and_then(|f| f.get("arguments"))),
    }
}

/// Decode a non-streaming `chat.completion` body.
pub(super) fn decode_completion_body(body: &Value) -> Result<Completion> {
    if let Some(msg) = error_message(body) {
        return Err(EngineError::UpstreamStream(msg));
    }
    let first = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .ok_or(EngineError::EmptyUpstreamResponse)?;
    let message = first.get("message").cloned().unwrap_or(Value::Null);

    let content = match message.get("content") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    };

    let tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .map(|tc| {
                    let d = decode_tool_call_delta(tc);
                    ToolCall {
                        id: d.id.unwrap_or_default(),
                        call_type: d.call_type.unwrap_or_else(|| "function".to_string()),
                        function: FunctionCall {
                            name: d.name.unwrap_or_default(),
                            arguments: d.arguments.unwrap_or_default(),
                        },
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Completion {
        content,
        tool_calls,
        total_tokens: body
            .get("usage")
            .and_then(|u| u.get("total_tokens"))
            .and_then(Value::as_u64)
            .unwrap_or(0),
    })
}

// ─── vendor-F: OpenAI / Aliyun ──────────────────────────────────────────────

/// OpenAI and Aliyun DashScope (compatible mode).
///
/// User turns with images go out as multi-part content; everything else is a plain string.
pub struct OpenAiProvider {
    vendor: Vendor,
    api_base: String,
    api_key: String,
}

impl OpenAiProvider {
    pub fn new(vendor: Vendor, api_base: String, api_key: String) -> Self {
        Self {
            vendor,
            api_base,
            api_key,
        }
    }

    fn content(msg: &ChatMessage) -> Option<Value> {
        match &msg.content {
            Some(MessageContent::Parts(parts)) if msg.role == Role::User => {
                Some(encode_parts(parts))
            }
            Some(c) => Some(json!(c.text())),
            None if msg.tool_calls.is_some() => Some(Value::Null),
            None => Some(json!("")),
        }
    }
}

impl Provider for OpenAiProvider {
    fn vendor(&self) -> Vendor {
        self.vendor
    }

    fn endpoint(&self, _model: &str, _stream: bool) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header("Authorization", format!("Bearer {}", self.api_key))
    }

    fn encode_request(&self, request: &ChatRequest<'_>, stream: bool) -> Result<Value> {
        let messages = request
            .messages
            .iter()
            .map(|m| encode_message(m, Self::content(m)))
            .collect();
        Ok(encode_body(request, messages, stream))
    }

    fn decode_line(&self, line: &str) -> LineEvent {
        decode_sse_line(line)
    }

    fn decode_completion(&self, body: Value) -> Result<Completion> {
        decode_completion_body(&body)
    }
}
