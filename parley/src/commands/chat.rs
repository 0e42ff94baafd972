//! `chat`, `task` and `route`: one user turn each, streamed to the terminal.

use anyhow::{Context, Result};
use parley_agent::router::AgentRouter;
use parley_agent::task_planner::TaskPlanner;
use parley_agent::{SessionBuilder, SessionOutcome};

use super::{terminal_adapter, Engine};
use crate::cli::EngineArgs;

pub async fn run_chat(prompt: &str, images: Vec<String>, args: &EngineArgs) -> Result<()> {
    let engine = Engine::from_args(args)?;
    let (tx, printer) = terminal_adapter();
    let result = SessionBuilder::new(engine.ctx, args.user.as_str(), prompt, tx)
        .model(engine.model.as_deref())
        .images(images)
        .build()
        .await
        .run()
        .await;
    finish(result, printer).await
}

pub async fn run_task(prompt: &str, args: &EngineArgs) -> Result<()> {
    let engine = Engine::from_args(args)?;
    if engine.agents.is_empty() {
        tracing::warn!("no tool-agents configured, plans can only be answered directly");
    }
    let planner = TaskPlanner::new(engine.ctx, engine.agents, engine.prompts)
        .with_model(engine.model.as_deref());
    let (tx, printer) = terminal_adapter();
    let result = planner.run(&args.user, prompt, tx).await;
    finish(result, printer).await
}

pub async fn run_route(prompt: &str, args: &EngineArgs) -> Result<()> {
    let engine = Engine::from_args(args)?;
    let router = AgentRouter::new(engine.ctx, engine.agents, engine.prompts)
        .with_model(engine.model.as_deref());
    let (tx, printer) = terminal_adapter();
    let result = router.run(&args.user, prompt, tx).await;
    finish(result, printer).await
}

/// Wait for the printer to drain the channel, then report the outcome.
async fn finish(
    result: parley_agent::Result<SessionOutcome>,
    printer: tokio::task::JoinHandle<()>,
) -> Result<()> {
    printer.await.context("terminal printer failed")?;
    let outcome = result.context("conversation failed")?;
    tracing::info!(tokens = outcome.tokens, loops = outcome.loops, "turn finished");
    Ok(())
}
