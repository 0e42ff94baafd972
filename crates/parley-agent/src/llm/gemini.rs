//! vendor-B: Google Gemini native API (`streamGenerateContent?alt=sse`).
//!
//! Gemini differences:
//!   - System turns are a separate `systemInstruction` field
//!   - The assistant role is `model`, content is always a list of parts
//!   - Tool calls are `functionCall` parts with an object `args`; results are
//!     `functionResponse` parts batched into one user turn
//!   - Usage metadata is cumulative across chunks

use serde_json::{json, Map, Value};

use super::{
    error_message, sse_data, ChatRequest, Completion, LineEvent, Provider, StreamDelta,
    ToolCallDelta, Vendor,
};
use crate::error::{EngineError, Result};
use crate::types::{ChatMessage, ContentPart, FunctionCall, Role, ToolCall, ToolDefinition};

pub struct GeminiProvider {
    api_base: String,
    api_key: String,
}

impl GeminiProvider {
    pub fn new(api_base: String, api_key: String) -> Self {
        Self { api_base, api_key }
    }

    /// Convert history into `(systemInstruction text, contents)`.
    pub(super) fn convert_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<Value>) {
        let mut system_prompt: Option<String> = None;
        let mut contents: Vec<Value> = Vec::new();
        let mut pending_responses: Vec<Value> = Vec::new();

        for msg in messages {
            if msg.role != Role::Tool && !pending_responses.is_empty() {
                contents.push(json!({ "role": "user", "parts": pending_responses.clone() }));
                pending_responses.clear();
            }

            match msg.role {
                Role::System => {
                    let text = msg.text();
                    if !text.is_empty() {
                        system_prompt = Some(match system_prompt {
                            Some(existing) => format!("{}\n\n{}", existing, text),
                            None => text,
                        });
                    }
                }
                Role::User => {
                    let parts: Vec<Value> = msg
                        .content
                        .as_ref()
                        .map(|c| c.to_parts().iter().map(encode_part).collect())
                        .unwrap_or_default();
                    if !parts.is_empty() {
                        contents.push(json!({ "role": "user", "parts": parts }));
                    }
                }
                Role::Assistant => {
                    let mut parts: Vec<Value> = Vec::new();
                    let text = msg.text();
                    if !text.is_empty() {
                        parts.push(json!({ "text": text }));
                    }
                    for tc in msg.tool_calls.iter().flatten() {
                        let args: Value =
                            serde_json::from_str(&tc.function.arguments).unwrap_or(json!({}));
                        parts.push(json!({
                            "functionCall": { "name": tc.function.name, "args": args }
                        }));
                    }
                    if !parts.is_empty() {
                        contents.push(json!({ "role": "model", "parts": parts }));
                    }
                }
                Role::Tool => {
                    pending_responses.push(json!({
                        "functionResponse": {
                            "name": msg.name.clone().unwrap_or_default(),
                            "response": { "output": msg.text() }
                        }
                    }));
                }
            }
        }

        if !pending_responses.is_empty() {
            contents.push(json!({ "role": "user", "parts": pending_responses }));
        }

        (system_prompt, contents)
    }

    fn encode_tools(tools: &[ToolDefinition]) -> Value {
        let declarations: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.function.name,
                    "description": t.function.description,
                    "parameters": sanitize_schema(&t.function.parameters),
                })
            })
            .collect();
        json!([{ "functionDeclarations": declarations }])
    }

    fn decode_candidate(body: &Value) -> (String, Vec<ToolCallDelta>) {
        let mut text = String::new();
        let mut calls = Vec::new();
        let parts = body
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(Value::as_array);
        for part in parts.into_iter().flatten() {
            if part.get("thought").and_then(Value::as_bool) == Some(true) {
                continue;
            }
            if let Some(t) = part.get("text").and_then(Value::as_str) {
                text.push_str(t);
            }
            if let Some(fc) = part.get("functionCall") {
                let args = fc.get("args").cloned().unwrap_or_else(|| json!({}));
                calls.push(ToolCallDelta {
                    index: Some(calls.len() as u32),
                    id: fc.get("id").and_then(Value::as_str).map(str::to_string),
                    call_type: Some("function".to_string()),
                    name: fc.get("name").and_then(Value::as_str).map(str::to_string),
                    arguments: Some(args.to_string()),
                });
            }
        }
        (text, calls)
    }

    fn total_tokens(body: &Value) -> Option<u64> {
        body.get("usageMetadata")
            .and_then(|u| u.get("totalTokenCount"))
            .and_then(Value::as_u64)
    }
}

fn encode_part(part: &ContentPart) -> Value {
    match part {
        ContentPart::Text { text } => json!({ "text": text }),
        ContentPart::ImageUrl { image_url } => match image_url.as_inline_data() {
            Some((mime, data)) => json!({ "inlineData": { "mimeType": mime, "data": data } }),
            None => json!({ "fileData": { "fileUri": image_url.url } }),
        },
    }
}

/// Gemini rejects some JSON-schema keywords that OpenAI-style tools carry.
fn sanitize_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let cleaned: Map<String, Value> = map
                .iter()
                .filter(|(k, _)| k.as_str() != "$schema" && k.as_str() != "additionalProperties")
                .map(|(k, v)| (k.clone(), sanitize_schema(v)))
                .collect();
            Value::Object(cleaned)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize_schema).collect()),
        other => other.clone(),
    }
}

impl Provider for GeminiProvider {
    fn vendor(&self) -> Vendor {
        Vendor::Gemini
    }

    fn endpoint(&self, model: &str, stream: bool) -> String {
        if stream {
            format!("{}/models/{}:streamGenerateContent?alt=sse", self.api_base, model)
        } else {
            format!("{}/models/{}:generateContent", self.api_base, model)
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header("x-goog-api-key", &self.api_key)
    }

    fn encode_request(&self, request: &ChatRequest<'_>, _stream: bool) -> Result<Value> {
        let (system, contents) = Self::convert_messages(request.messages);
        let s = request.sampling;
        let mut generation = json!({
            "temperature": s.temperature,
            "topP": s.top_p,
            "maxOutputTokens": s.max_tokens,
        });
        if s.frequency_penalty != 0.0 {
            generation["frequencyPenalty"] = json!(s.frequency_penalty);
        }
        if s.presence_penalty != 0.0 {
            generation["presencePenalty"] = json!(s.presence_penalty);
        }
        if !s.stop.is_empty() {
            generation["stopSequences"] = json!(s.stop);
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": generation,
        });
        if let Some(sys) = system {
            body["systemInstruction"] = json!({ "parts": [{ "text": sys }] });
        }
        if !request.tools.is_empty() {
            body["tools"] = Self::encode_tools(request.tools);
        }
        Ok(body)
    }

    fn decode_line(&self, line: &str) -> LineEvent {
        let Some(data) = sse_data(line) else {
            return LineEvent::Skip;
        };
        let chunk: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(err = %e, "skipping undecodable gemini line");
                return LineEvent::Skip;
            }
        };
        if let Some(msg) = error_message(&chunk) {
            return LineEvent::Failed(msg);
        }
        let (text, tool_calls) = Self::decode_candidate(&chunk);
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
        let has_candidates = body
            .get("candidates")
            .and_then(Value::as_array)
            .is_some_and(|c| !c.is_empty());
        if !has_candidates {
            return Err(EngineError::EmptyUpstreamResponse);
        }
        let (content, calls) = Self::decode_candidate(&body);
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
