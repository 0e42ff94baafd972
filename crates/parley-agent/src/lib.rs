//! Parley Agent: multi-vendor LLM conversation engine.
//!
//! A [`session::Session`] drives one user turn: it streams from a vendor,
//! rebuilds tool calls from partial deltas, runs the tools and sends again
//! until the model answers, emitting bounded chunks on an mpsc channel the
//! platform adapter reads. [`task_planner::TaskPlanner`] and
//! [`router::AgentRouter`] sit on top and drive sessions scoped to named
//! tool-agents.

pub mod accumulator;
pub mod emitter;
pub mod error;
pub mod history;
pub mod llm;
pub mod prompt;
pub mod router;
pub mod session;
pub mod task_planner;
pub mod tools;
pub mod types;

#[cfg(test)]
mod test_support;

pub use error::{EngineError, Result};
pub use session::{EngineContext, Session, SessionBuilder, SessionOutcome};
