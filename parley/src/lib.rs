//! Parley CLI library: a terminal front end for the parley engine.

mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use parley_core::observability::{init_tracing, TracingMode};

/// Run the CLI: parse args and dispatch to command handlers.
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    let is_conversation = !matches!(cli.command, Commands::Models { .. });
    init_tracing(if is_conversation {
        TracingMode::Chat
    } else {
        TracingMode::Default
    });

    match cli.command {
        Commands::Models { vendor } => commands::models::list_models(vendor.as_deref()),
        Commands::Chat {
            prompt,
            image,
            engine,
        } => block_on(commands::chat::run_chat(&prompt, image, &engine)),
        Commands::Task { prompt, engine } => block_on(commands::chat::run_task(&prompt, &engine)),
        Commands::Route { prompt, engine } => block_on(commands::chat::run_route(&prompt, &engine)),
    }
}

/// Conversation commands run on a fresh multi-threaded runtime.
fn block_on<F: std::future::Future<Output = Result<()>>>(fut: F) -> Result<()> {
    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    rt.block_on(fut)
}
