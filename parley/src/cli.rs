use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Parley - multi-vendor LLM conversations with tools, from the terminal
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask one question; the answer streams to stdout
    Chat {
        /// The prompt
        #[arg(value_name = "PROMPT")]
        prompt: String,

        /// Attach an image (data url or http url); can be repeated
        #[arg(long, value_name = "URL")]
        image: Vec<String>,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Plan the task across the configured tool-agents, run it, then summarize
    Task {
        /// The task
        #[arg(value_name = "PROMPT")]
        prompt: String,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Let the model pick one tool-agent, then answer with that agent's tools
    Route {
        /// The request
        #[arg(value_name = "PROMPT")]
        prompt: String,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// List default and known models per vendor
    Models {
        /// Only this vendor (deepseek, gemini, openrouter, vol, ollama, openai, aliyun)
        #[arg(long)]
        vendor: Option<String>,
    },
}

/// Options shared by the conversation commands.
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// User id; history is kept per user
    #[arg(long, env = "PARLEY_USER", default_value = "local")]
    pub user: String,

    /// LLM vendor (default: PARLEY_VENDOR or deepseek)
    #[arg(long)]
    pub vendor: Option<String>,

    /// Model name; unknown names fall back to the vendor default
    #[arg(long, short)]
    pub model: Option<String>,

    /// Agents YAML file with tool-agents and prompt overrides
    #[arg(long, env = "PARLEY_AGENTS", value_name = "FILE")]
    pub agents: Option<PathBuf>,

    /// History database path (default: PARLEY_DB_PATH or ~/.parley/history.db)
    #[arg(long, value_name = "PATH", conflicts_with = "memory")]
    pub db: Option<PathBuf>,

    /// Keep history in memory only
    #[arg(long)]
    pub memory: bool,
}
