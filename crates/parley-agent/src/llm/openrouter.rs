//! vendor-C: OpenRouter. Every turn is sent as role + a list of content parts.

use serde_json::{json, Value};

use super::openai::{
    decode_completion_body, decode_sse_line, encode_body, encode_message, encode_parts,
};
use super::{ChatRequest, Completion, LineEvent, Provider, Vendor};
use crate::error::Result;
use crate::types::{ChatMessage, Role};

pub struct OpenRouterProvider {
    api_base: String,
    api_key: String,
}

impl OpenRouterProvider {
    pub fn new(api_base: String, api_key: String) -> Self {
        Self { api_base, api_key }
    }

    fn content(msg: &ChatMessage) -> Value {
        match (&msg.content, msg.role) {
            (Some(c), Role::Tool) => json!(c.text()),
            (Some(c), _) => encode_parts(&c.to_parts()),
            (None, _) => json!([]),
        }
    }
}

impl Provider for OpenRouterProvider {
    fn vendor(&self) -> Vendor {
        Vendor::OpenRouter
    }

    fn endpoint(&self, _model: &str, _stream: bool) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("X-Title", "parley")
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
        // OpenRouter sends ": OPENROUTER PROCESSING" keep-alive comments; sse_data skips them
        decode_sse_line(line)
    }

    fn decode_completion(&self, body: Value) -> Result<Completion> {
        decode_completion_body(&body)
    }
}
