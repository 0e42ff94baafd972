//! vendor-D: Volcengine Ark. Content is an optional string, omitted when absent.

use serde_json::{json, Value};

use super::openai::{
    decode_completion_body, decode_sse_line, encode_body, encode_message, encode_parts,
};
use super::{ChatRequest, Completion, LineEvent, Provider, Vendor};
use crate::error::Result;
use crate::types::{ChatMessage, MessageContent};

pub struct VolProvider {
    api_base: String,
    api_key: String,
}

impl VolProvider {
    pub fn new(api_base: String, api_key: String) -> Self {
        Self { api_base, api_key }
    }

    fn content(msg: &ChatMessage) -> Option<Value> {
        let content = msg.content.as_ref()?;
        match content {
            MessageContent::Parts(parts) if !content.images().is_empty() => {
                Some(encode_parts(parts))
            }
            c => Some(json!(c.text())),
        }
    }
}

impl Provider for VolProvider {
    fn vendor(&self) -> Vendor {
        Vendor::Vol
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
