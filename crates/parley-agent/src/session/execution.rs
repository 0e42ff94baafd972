//! Tool batch execution for one round.
//!
//! Tools run sequentially in stream order. A failing tool is logged and its
//! result omitted; the rest of the batch still runs.

use serde_json::{Map, Value};

use crate::emitter::ChunkEmitter;
use crate::error::{EngineError, Result};
use crate::tools::ToolRegistry;
use crate::types::{safe_truncate, ToolCall, ToolDefinition};

const NOTICE_RESULT_MAX_BYTES: usize = 1500;

/// A tool call that produced a result.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ExecutedCall {
    pub call: ToolCall,
    pub result: String,
}

/// Execute a batch. Only an outbound-channel failure while sending tool
/// notices is returned as an error.
pub(crate) async fn execute_tool_calls(
    calls: &[ToolCall],
    registry: &dyn ToolRegistry,
    available: &[ToolDefinition],
    retry_times: usize,
    mut notify: Option<&mut ChunkEmitter>,
) -> Result<Vec<ExecutedCall>> {
    let mut executed = Vec::with_capacity(calls.len());
    for call in calls {
        match execute_one(call, registry, available, retry_times).await {
            Ok(result) => {
                tracing::info!(
                    tool = %call.function.name,
                    result_len = result.len(),
                    "tool executed"
                );
                if let Some(emitter) = notify.as_deref_mut() {
                    emitter.notice(&tool_notice(call, &result)).await?;
                }
                executed.push(ExecutedCall {
                    call: call.clone(),
                    result,
                });
            }
            Err(e) => {
                tracing::warn!(tool = %call.function.name, err = %e, "tool result omitted");
            }
        }
    }
    Ok(executed)
}

async fn execute_one(
    call: &ToolCall,
    registry: &dyn ToolRegistry,
    available: &[ToolDefinition],
    retry_times: usize,
) -> std::result::Result<String, EngineError> {
    let name = call.function.name.as_str();
    let failed = |reason: String| EngineError::ToolExecutionFailed {
        tool: name.to_string(),
        reason,
    };

    if !available.iter().any(|t| t.name() == name) {
        return Err(failed("tool is not available in this session".to_string()));
    }
    let args = parse_arguments(&call.function.arguments)
        .map_err(|e| failed(format!("invalid arguments: {}", e)))?;
    let client = registry
        .resolve_tool_client(name)
        .map_err(|e| failed(e.to_string()))?;

    let mut last_err = String::new();
    for attempt in 1..=retry_times.max(1) {
        match client.exec_tool(name, &args).await {
            Ok(result) => return Ok(result),
            Err(e) => {
                tracing::debug!(tool = %name, attempt, err = %e, "tool attempt failed");
                last_err = e.to_string();
            }
        }
    }
    Err(failed(last_err))
}

/// Tool arguments as an object; empty arguments mean no arguments.
pub(crate) fn parse_arguments(raw: &str) -> serde_json::Result<Map<String, Value>> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    serde_json::from_str(raw)
}

fn tool_notice(call: &ToolCall, result: &str) -> String {
    let shown = safe_truncate(result, NOTICE_RESULT_MAX_BYTES);
    let ellipsis = if shown.len() < result.len() { "..." } else { "" };
    format!(
        "function: {}\narguments: {}\nresult: {}{}",
        call.function.name, call.function.arguments, shown, ellipsis
    )
}
