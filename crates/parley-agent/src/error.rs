//! Engine error taxonomy.

use thiserror::Error;

use crate::llm::Vendor;

/// Errors produced by the conversation engine.
///
/// Only the fatal kinds (see [`EngineError::is_fatal`]) cross the session
/// boundary; the rest are handled where they occur.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Accumulated tool arguments are not valid JSON yet; keep consuming deltas.
    #[error("tool arguments incomplete")]
    ToolArgsIncomplete,

    /// One tool failed; its result is omitted and the round continues.
    #[error("tool '{tool}' failed: {reason}")]
    ToolExecutionFailed { tool: String, reason: String },

    #[error("too many loops: exceeded limit of {limit}")]
    TooManyLoops { limit: usize },

    #[error("upstream stream error: {0}")]
    UpstreamStream(String),

    #[error("{vendor} API error ({status}): {body}")]
    Upstream {
        vendor: Vendor,
        status: u16,
        body: String,
    },

    #[error("deadline exceeded after {secs}s")]
    DeadlineExceeded { secs: u64 },

    #[error("response is empty")]
    EmptyUpstreamResponse,

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The platform adapter dropped its receiver.
    #[error("outbound channel closed")]
    OutboundClosed,

    #[error("unknown vendor '{0}'")]
    UnknownVendor(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Whether this error ends the session and is surfaced to the adapter.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            EngineError::ToolArgsIncomplete | EngineError::ToolExecutionFailed { .. }
        )
    }

    /// Whether a single-shot request may be retried after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Transport(_)
                | EngineError::Upstream { .. }
                | EngineError::UpstreamStream(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(!EngineError::ToolArgsIncomplete.is_fatal());
        assert!(!EngineError::ToolExecutionFailed {
            tool: "t".into(),
            reason: "boom".into()
        }
        .is_fatal());
        assert!(EngineError::TooManyLoops { limit: 5 }.is_fatal());
        assert!(EngineError::DeadlineExceeded { secs: 300 }.is_fatal());
        assert!(EngineError::EmptyUpstreamResponse.is_fatal());
        assert!(EngineError::UpstreamStream("reset".into()).is_fatal());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            EngineError::TooManyLoops { limit: 5 }.to_string(),
            "too many loops: exceeded limit of 5"
        );
        let e = EngineError::Upstream {
            vendor: Vendor::DeepSeek,
            status: 401,
            body: "bad key".into(),
        };
        assert_eq!(e.to_string(), "deepseek API error (401): bad key");
    }
}
