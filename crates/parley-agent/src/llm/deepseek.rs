//! vendor-A: DeepSeek, OpenAI-compatible streaming JSON with string content.

use serde_json::{json, Value};

use super::openai::{decode_completion_body, decode_sse_line, encode_body, encode_message};
use super::{ChatRequest, Completion, LineEvent, Provider, Vendor};
use crate::error::Result;
use crate::types::ChatMessage;

/// DeepSeek only accepts string content, so images are dropped from history
/// and assistant tool-call turns carry an empty string.
pub struct DeepSeekProvider {
    api_base: String,
    api_key: String,
}

impl DeepSeekProvider {
    pub fn new(api_base: String, api_key: String) -> Self {
        Self { api_base, api_key }
    }

    fn content(msg: &ChatMessage) -> Value {
        json!(msg.text())
    }
}

impl Provider for DeepSeekProvider {
    fn vendor(&self) -> Vendor {
        Vendor::DeepSeek
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
            .map(|m| encode_message(m, Some(Self::content(m))))
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
