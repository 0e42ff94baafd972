//! vendor-E: Ollama native `/api/chat` (newline-delimited JSON).
//!
//! Tool-call arguments are JSON objects on the wire, not strings. The line
//! decoder also accepts OpenAI-style `data:` lines so an OpenAI-compatible
//! proxy in front of Ollama works too.

use serde_json::{json, Map, Value};

use super::openai::decode_sse_line;
use super::{
    error_message, ChatRequest, Completion, LineEvent, Provider, StreamDelta, ToolCallDelta,
    Vendor,
};
use crate::error::{EngineError, Result};
use crate::types::{ChatMessage, FunctionCall, ToolCall};

pub struct OllamaProvider {
    api_base: String,
    api_key: String,
}

impl OllamaProvider {
    pub fn new(api_base: String, api_key: String) -> Self {
        Self { api_base, api_key }
    }

    pub(super) fn encode_message(msg: &ChatMessage) -> Value {
        let mut out = Map::new();
        out.insert("role".into(), json!(msg.role.as_str()));
        out.insert("content".into(), json!(msg.text()));

        let images: Vec<&str> = msg
            .content
            .as_ref()
            .map(|c| {
                c.images()
                    .into_iter()
                    .filter_map(|img| img.as_inline_data().map(|(_, data)| data))
                    .collect()
            })
            .unwrap_or_default();
        if !images.is_empty() {
            out.insert("images".into(), json!(images));
        }

        if let Some(calls) = msg.tool_calls.as_ref().filter(|c| !c.is_empty()) {
            let encoded: Vec<Value> = calls
                .iter()
                .map(|tc| {
                    let args: Value =
                        serde_json::from_str(&tc.function.arguments).unwrap_or(json!({}));
                    json!({ "function": { "name": tc.function.name, "arguments": args } })
                })
                .collect();
            out.insert("tool_calls".into(), json!(encoded));
        }
        if let Some(name) = &msg.name {
            out.insert("tool_name".into(), json!(name));
        }
        Value::Object(out)
    }

    fn decode_message(message: &Value) -> (String, Vec<ToolCallDelta>) {
        let content = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let calls = message
            .get("tool_calls")
            .and_then(Value::as_array)
            .map(|calls| {
                calls
                    .iter()
                    .enumerate()
                    .map(|(i, tc)| {
                        let func = tc.get("function");
                        let arguments = match func.and_then(|f| f.get("arguments")) {
                            Some(Value::String(s)) => s.clone(),
                            Some(v) => v.to_string(),
                            None => "{}".to_string(),
                        };
                        ToolCallDelta {
                            index: Some(i as u32),
                            id: tc.get("id").and_then(Value::as_str).map(str::to_string),
                            call_type: Some("function".to_string()),
                            name: func
                                .and_then(|f| f.get("name"))
                                .and_then(Value::as_str)
                                .map(str::to_string),
                            arguments: Some(arguments),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();
        (content, calls)
    }

    fn total_tokens(body: &Value) -> Option<u64> {
        if body.get("done").and_then(Value::as_bool) != Some(true) {
            return None;
        }
        let prompt = body.get("prompt_eval_count").and_then(Value::as_u64).unwrap_or(0);
        let eval = body.get("eval_count").and_then(Value::as_u64).unwrap_or(0);
        Some(prompt + eval)
    }
}

impl Provider for OllamaProvider {
    fn vendor(&self) -> Vendor {
        Vendor::Ollama
    }

    fn endpoint(&self, _model: &str, _stream: bool) -> String {
        format!("{}/api/chat", self.api_base)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            request
        } else {
            request.header("Authorization", format!("Bearer {}", self.api_key))
        }
    }

    fn encode_request(&self, request: &ChatRequest<'_>, stream: bool) -> Result<Value> {
        let s = request.sampling;
        let messages: Vec<Value> = request.messages.iter().map(Self::encode_message).collect();
        let mut options = json!({
            "temperature": s.temperature,
            "top_p": s.top_p,
            "num_predict": s.max_tokens,
            "frequency_penalty": s.frequency_penalty,
            "presence_penalty": s.presence_penalty,
        });
        if !s.stop.is_empty() {
            options["stop"] = json!(s.stop);
        }
        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "stream": stream,
            "options": options,
        });
        if !request.tools.is_empty() {
            body["tools"] = json!(request.tools);
        }
        Ok(body)
    }

    fn decode_line(&self, line: &str) -> LineEvent {
        if line.is_empty() {
            return LineEvent::Skip;
        }
        if line.starts_with("data:") {
            return decode_sse_line(line);
        }
        let chunk: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(err = %e, "skipping undecodable ollama line");
                return LineEvent::Skip;
            }
        };
        if let Some(msg) = error_message(&chunk) {
            return LineEvent::Failed(msg);
        }
        let (text, tool_calls) = chunk
            .get("message")
            .map(Self::decode_message)
            .unwrap_or_default();
        let delta = StreamDelta {
            content: (!text.is_empty()).then_some(text),
            tool_calls,
            total_tokens: Self::total_tokens(&chunk),
        };
        if delta.is_empty() {
            LineEvent::Skip
        } else {
            LineEvent::Delta(delta)
        }
    }

    fn decode_completion(&self, body: Value) -> Result<Completion> {
        if let Some(msg) = error_message(&body) {
            return Err(EngineError::UpstreamStream(msg));
        }
        let message = body.get("message").ok_or(EngineError::EmptyUpstreamResponse)?;
        let (content, calls) = Self::decode_message(message);
        let tool_calls = calls
            .into_iter()
            .map(|d| ToolCall {
                id: d.id.unwrap_or_default(),
                call_type: "function".to_string(),
                function: FunctionCall {
                    name: d.name.unwrap_or_default(),
                    arguments: d.arguments.unwrap_or_else(|| "{}".to_string()),
                },
            })
            .collect();
        Ok(Completion {
            content,
            tool_calls,
            total_tokens: Self::total_tokens(&body).unwrap_or(0),
        })
    }
}
