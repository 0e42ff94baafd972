//! Shared types for the engine: the vendor-agnostic message model, tool
//! definitions and the outbound chunk.

use serde::{Deserialize, Serialize};

// ─── UTF-8 / UTF-16 string helpers ──────────────────────────────────────────

/// Number of UTF-16 code units needed to encode `s`.
///
/// Platform message limits are counted in UTF-16 units, so astral-plane
/// characters count twice.
pub fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

/// Split `s` into pieces of at most `max_units` UTF-16 units, never splitting a character.
pub fn split_utf16(s: &str, max_units: usize) -> Vec<&str> {
    let max_units = max_units.max(2);
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut units = 0;
    for (idx, ch) in s.char_indices() {
        let w = ch.len_utf16();
        if units + w > max_units {
            pieces.push(&s[start..idx]);
            start = idx;
            units = 0;
        }
        units += w;
    }
    if start < s.len() {
        pieces.push(&s[start..]);
    }
    pieces
}

/// Truncate a string at a safe UTF-8 char boundary (from the start).
pub fn safe_truncate(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ─── Chat message model ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// One part of a multi-part message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

impl ImageUrl {
    /// Split a `data:<mime>;base64,<payload>` URL into `(mime, payload)`.
    pub fn as_inline_data(&self) -> Option<(&str, &str)> {
        let rest = self.url.strip_prefix("data:")?;
        let (meta, payload) = rest.split_once(',')?;
        let mime = meta.strip_suffix(";base64")?;
        Some((mime, payload))
    }
}

/// Plain text or a list of parts (text / image url).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Concatenated text of every text part.
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn images(&self) -> Vec<&ImageUrl> {
        match self {
            MessageContent::Text(_) => Vec::new(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::ImageUrl { image_url } => Some(image_url),
                    ContentPart::Text { .. } => None,
                })
                .collect(),
        }
    }

    /// Always returns the parts form (plain text becomes one text part).
    pub fn to_parts(&self) -> Vec<ContentPart> {
        match self {
            MessageContent::Text(t) => vec![ContentPart::Text { text: t.clone() }],
            MessageContent::Parts(parts) => parts.clone(),
        }
    }
}

/// A chat turn, independent of any vendor wire format.
///
/// This is also the persisted form of tool messages in the history store, so
/// a conversation recorded under one vendor replays under another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool name on tool-result messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    fn text_message(role: Role, content: &str) -> Self {
        Self {
            role,
            content: Some(MessageContent::Text(content.to_string())),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: &str) -> Self {
        Self::text_message(Role::System, content)
    }

    pub fn user(content: &str) -> Self {
        Self::text_message(Role::User, content)
    }

    /// User turn with attached images (data urls or http urls).
    pub fn user_with_images(content: &str, image_urls: &[String]) -> Self {
        if image_urls.is_empty() {
            return Self::user(content);
        }
        let mut parts = vec![ContentPart::Text {
            text: content.to_string(),
        }];
        parts.extend(image_urls.iter().map(|url| ContentPart::ImageUrl {
            image_url: ImageUrl { url: url.clone() },
        }));
        Self {
            role: Role::User,
            content: Some(MessageContent::Parts(parts)),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self::text_message(Role::Assistant, content)
    }

    pub fn assistant_with_tool_calls(content: Option<&str>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content
                .filter(|c| !c.is_empty())
                .map(|c| MessageContent::Text(c.to_string())),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn tool_result(tool_call_id: &str, tool_name: &str, content: &str) -> Self {
        Self {
            role: Role::Tool,
            content: Some(MessageContent::Text(content.to_string())),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.to_string()),
            name: Some(tool_name.to_string()),
        }
    }

    /// Text of the message, empty when there is none.
    pub fn text(&self) -> String {
        self.content.as_ref().map(MessageContent::text).unwrap_or_default()
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }
}

/// Function call details. `arguments` is a JSON object encoded as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// OpenAI-style tool definition; the vendor encoders translate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDef,
}

impl ToolDefinition {
    pub fn function(name: &str, description: &str, parameters: serde_json::Value) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDef {
                name: name.to_string(),
                description: description.to_string(),
                parameters,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

// ─── Outbound chunks ────────────────────────────────────────────────────────

/// What an outbound chunk carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// A slice of the model's answer.
    Answer,
    /// Side information (tool notices, powered-by footer).
    Notice,
    /// A fatal error rendered for the user.
    Error,
}

/// One item on the outbound channel consumed by the platform adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgChunk {
    /// Text not sent in any earlier chunk.
    pub content: String,
    /// Send threshold in effect when the chunk was emitted.
    pub send_len_hint: usize,
    pub kind: ChunkKind,
    /// The current platform message is complete; the next chunk starts a new one.
    pub finished: bool,
}

impl MsgChunk {
    pub fn answer(content: String, send_len_hint: usize, finished: bool) -> Self {
        Self {
            content,
            send_len_hint,
            kind: ChunkKind::Answer,
            finished,
        }
    }

    pub fn notice(content: String) -> Self {
        Self {
            content,
            send_len_hint: 0,
            kind: ChunkKind::Notice,
            finished: true,
        }
    }

    pub fn error(content: String) -> Self {
        Self {
            content,
            send_len_hint: 0,
            kind: ChunkKind::Error,
            finished: true,
        }
    }
}
