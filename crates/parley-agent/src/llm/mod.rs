//! LLM HTTP client for chat completions with tool calling.
//!
//! Six wire protocols sit behind one [`Provider`] trait:
//!   - **vendor-A** DeepSeek: OpenAI-compatible SSE, string content
//!   - **vendor-B** Gemini: native `streamGenerateContent`, content parts
//!   - **vendor-C** OpenRouter: OpenAI-compatible, every turn as role + content parts
//!   - **vendor-D** Vol (Ark): OpenAI-compatible, optional string content
//!   - **vendor-E** Ollama: native `/api/chat`, newline-delimited JSON
//!   - **vendor-F** OpenAI / Aliyun: OpenAI-compatible, multi-part user content
//!
//! Providers only encode requests and decode lines; [`LlmClient`] owns the
//! transport, retries and the line-buffered stream reader.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use parley_core::config::{EngineConfig, LlmConfig, SamplingConfig};
use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::types::{ChatMessage, ToolCall, ToolDefinition};

mod deepseek;
mod gemini;
mod models;
mod ollama;
mod openai;
mod openrouter;
mod stream;
mod vol;

pub use deepseek::DeepSeekProvider;
pub use gemini::GeminiProvider;
pub use models::{ModelRegistry, VendorModels};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use openrouter::OpenRouterProvider;
pub use stream::DeltaStream;
pub use vol::VolProvider;


// ─── Vendor ─────────────────────────────────────────────────────────────────

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    DeepSeek,
    Gemini,
    OpenRouter,
    Vol,
    Ollama,
    OpenAi,
    Aliyun,
}

impl Vendor {
    pub const ALL: [Vendor; 7] = [
        Vendor::DeepSeek,
        Vendor::Gemini,
        Vendor::OpenRouter,
        Vendor::Vol,
        Vendor::Ollama,
        Vendor::OpenAi,
        Vendor::Aliyun,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::DeepSeek => "deepseek",
            Vendor::Gemini => "gemini",
            Vendor::OpenRouter => "openrouter",
            Vendor::Vol => "vol",
            Vendor::Ollama => "ollama",
            Vendor::OpenAi => "openai",
            Vendor::Aliyun => "aliyun",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vendor {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "deepseek" => Ok(Vendor::DeepSeek),
            "gemini" => Ok(Vendor::Gemini),
            "openrouter" | "open_router" => Ok(Vendor::OpenRouter),
            "vol" | "ark" | "volcengine" => Ok(Vendor::Vol),
            "ollama" => Ok(Vendor::Ollama),
            "openai" => Ok(Vendor::OpenAi),
            "aliyun" | "dashscope" => Ok(Vendor::Aliyun),
            other => Err(EngineError::UnknownVendor(other.to_string())),
        }
    }
}

// ─── Request / decoded response types ───────────────────────────────────────

/// Everything a provider needs to encode one request.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub tools: &'a [ToolDefinition],
    pub sampling: &'a SamplingConfig,
}

/// One tool-call fragment as it appears in a vendor delta.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallDelta {
    pub index: Option<u32>,
    pub id: Option<String>,
    pub call_type: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
}

/// Vendor-agnostic streamed delta.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamDelta {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallDelta>,
    /// Total tokens reported so far for this request (cumulative; last value wins).
    pub total_tokens: Option<u64>,
}

impl StreamDelta {
    pub fn is_empty(&self) -> bool {
        self.content.as_deref().map_or(true, str::is_empty)
            && self.tool_calls.is_empty()
            && self.total_tokens.is_none()
    }
}

/// Result of decoding one line of a streamed body.
#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent {
    Delta(StreamDelta),
    /// End-of-stream marker.
    Done,
    /// Blank line, keep-alive comment or a payload with nothing in it.
    Skip,
    /// The vendor reported an error inside the stream.
    Failed(String),
}

/// Decoded single-shot response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    /// Text of the first choice.
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub total_tokens: u64,
}

// ─── Provider contract ──────────────────────────────────────────────────────

/// Vendor-specific half of a provider client: endpoints, auth, request
/// encoding and response decoding.
pub trait Provider: Send + Sync {
    fn vendor(&self) -> Vendor;

    /// Full URL for a streaming or single-shot call.
    fn endpoint(&self, model: &str, stream: bool) -> String;

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder;

    fn encode_request(&self, request: &ChatRequest<'_>, stream: bool) -> Result<Value>;

    /// Decode one trimmed line of a streamed body.
    fn decode_line(&self, line: &str) -> LineEvent;

    /// Decode a single-shot body. Zero choices is [`EngineError::EmptyUpstreamResponse`].
    fn decode_completion(&self, body: Value) -> Result<Completion>;
}

/// Build the provider for `vendor`, falling back to the registry's default base url.
pub fn provider_for(
    vendor: Vendor,
    base_url: Option<&str>,
    api_key: Option<&str>,
    registry: &ModelRegistry,
) -> Arc<dyn Provider> {
    let base = base_url
        .or_else(|| registry.default_base_url(vendor))
        .unwrap_or_default()
        .trim_end_matches('/')
        .to_string();
    let key = api_key.unwrap_or_default().to_string();
    match vendor {
        Vendor::DeepSeek => Arc::new(DeepSeekProvider::new(base, key)),
        Vendor::Gemini => Arc::new(GeminiProvider::new(base, key)),
        Vendor::OpenRouter => Arc::new(OpenRouterProvider::new(base, key)),
        Vendor::Vol => Arc::new(VolProvider::new(base, key)),
        Vendor::Ollama => Arc::new(OllamaProvider::new(base, key)),
        Vendor::OpenAi | Vendor::Aliyun => Arc::new(OpenAiProvider::new(vendor, base, key)),
    }
}

// ─── Transport ──────────────────────────────────────────────────────────────

/// Shared HTTP transport for every provider.
pub struct LlmClient {
    http: reqwest::Client,
    provider: Arc<dyn Provider>,
    sampling: SamplingConfig,
    retry_times: usize,
}

impl LlmClient {
    pub fn new(
        provider: Arc<dyn Provider>,
        sampling: SamplingConfig,
        engine: &EngineConfig,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(engine.http_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            provider,
            sampling,
            retry_times: engine.retry_times.max(1),
        })
    }

    /// Build a client from the env-driven configuration.
    pub fn from_config(
        llm: &LlmConfig,
        sampling: SamplingConfig,
        engine: &EngineConfig,
        registry: &ModelRegistry,
    ) -> Result<Self> {
        let vendor: Vendor = llm.vendor.parse()?;
        let api_key = llm.api_key_for(vendor.as_str());
        if api_key.is_none() && vendor != Vendor::Ollama {
            tracing::warn!(vendor = %vendor, "no API key configured");
        }
        let provider = provider_for(vendor, llm.base_url.as_deref(), api_key.as_deref(), registry);
        Self::new(provider, sampling, engine)
    }

    pub fn vendor(&self) -> Vendor {
        self.provider.vendor()
    }

    fn request<'a>(
        &'a self,
        model: &'a str,
        messages: &'a [ChatMessage],
        tools: &'a [ToolDefinition],
    ) -> ChatRequest<'a> {
        ChatRequest {
            model,
            messages,
            tools,
            sampling: &self.sampling,
        }
    }

    async fn post(&self, model: &str, body: &Value, stream: bool) -> Result<reqwest::Response> {
        let url = self.provider.endpoint(model, stream);
        let resp = self
            .provider
            .authorize(self.http.post(&url))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(EngineError::Upstream {
                vendor: self.vendor(),
                status: status.as_u16(),
                body: body_text,
            });
        }
        Ok(resp)
    }

    /// Open a streaming call. Deltas are pulled with [`DeltaStream::next_delta`].
    pub async fn stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<DeltaStream> {
        let body = self
            .provider
            .encode_request(&self.request(model, messages, tools), true)?;
        let resp = self.post(model, &body, true).await?;
        let bytes = resp
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|b| b.to_vec())
                    .map_err(|e| EngineError::UpstreamStream(e.to_string()))
            })
            .boxed();
        Ok(DeltaStream::new(bytes, Arc::clone(&self.provider)))
    }

    /// Single-shot call, retried up to `retry_times` on transport and upstream errors.
    pub async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<Completion> {
        let body = self
            .provider
            .encode_request(&self.request(model, messages, tools), false)?;

        let mut last_err = None;
        for attempt in 1..=self.retry_times {
            match self.complete_once(model, &body).await {
                Ok(c) => return Ok(c),
                Err(e) if e.is_retryable() => {
                    tracing::warn!(
                        vendor = %self.vendor(),
                        attempt,
                        err = %e,
                        "single-shot request failed"
                    );
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(EngineError::EmptyUpstreamResponse))
    }

    async fn complete_once(&self, model: &str, body: &Value) -> Result<Completion> {
        let resp = self.post(model, body, false).await?;
        let json: Value = resp.json().await?;
        self.provider.decode_completion(json)
    }
}

// ─── Shared decoding helpers ────────────────────────────────────────────────

/// Strip an SSE `data:` prefix. Returns None for other SSE fields and comments.
pub(crate) fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

/// Extract a readable message from a vendor `error` payload.
pub(crate) fn error_message(v: &Value) -> Option<String> {
    let err = v.get("error")?;
    if err.is_null() {
        return None;
    }
    Some(
        err.get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .or_else(|| err.as_str().map(str::to_string))
            .unwrap_or_else(|| err.to_string()),
    )
}
