//! Stream tool-call accumulator.
//!
//! Vendors stream function-call arguments token by token with no explicit
//! end-of-arguments marker, so the only completion signal is "the
//! concatenated arguments parse as a JSON object". Every fragment triggers a
//! re-parse of the last call.

use serde_json::{Map, Value};

use crate::error::{EngineError, Result};
use crate::llm::ToolCallDelta;
use crate::types::{FunctionCall, ToolCall};

/// Per-round state reconstructing complete tool calls from fragments.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: Vec<ToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment.
    ///
    /// A fragment with a non-empty name opens a new call; anything else
    /// continues the last one. Returns [`EngineError::ToolArgsIncomplete`]
    /// while the last call's arguments are not a complete JSON object yet.
    pub fn push(&mut self, fragment: &ToolCallDelta) -> Result<()> {
        let name = fragment.name.as_deref().filter(|n| !n.is_empty());
        match name {
            Some(name) => self.calls.push(ToolCall {
                id: fragment.id.clone().unwrap_or_default(),
                call_type: fragment.call_type.clone().unwrap_or_default(),
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: fragment.arguments.clone().unwrap_or_default(),
                },
            }),
            None => {
                let Some(last) = self.calls.last_mut() else {
                    tracing::debug!("tool-call continuation with no open call, ignored");
                    return Err(EngineError::ToolArgsIncomplete);
                };
                if let Some(id) = fragment.id.as_deref().filter(|s| !s.is_empty()) {
                    if last.id.is_empty() {
                        last.id = id.to_string();
                    }
                }
                if let Some(t) = fragment.call_type.as_deref().filter(|s| !s.is_empty()) {
                    if last.call_type.is_empty() {
                        last.call_type = t.to_string();
                    }
                }
                if let Some(args) = &fragment.arguments {
                    last.function.arguments.push_str(args);
                }
            }
        }
        self.check_last()
    }

    fn check_last(&self) -> Result<()> {
        let Some(last) = self.calls.last() else {
            return Err(EngineError::ToolArgsIncomplete);
        };
        serde_json::from_str::<Map<String, Value>>(&last.function.arguments)
            .map(|_| ())
            .map_err(|_| EngineError::ToolArgsIncomplete)
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn calls(&self) -> &[ToolCall] {
        &self.calls
    }

    /// Close the round: fill missing ids and types, hand over the calls.
    pub fn finish(self) -> Vec<ToolCall> {
        self.calls
            .into_iter()
            .map(|mut call| {
                if call.id.is_empty() {
                    call.id = format!("call_{}", uuid::Uuid::new_v4().simple());
                }
                if call.call_type.is_empty() {
                    call.call_type = "function".to_string();
                }
                call
            })
            .collect()
    }
}
