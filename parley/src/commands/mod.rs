//! Command handlers. Conversation commands share one engine setup and one
//! stdout adapter.

pub mod chat;
pub mod models;

use std::sync::Arc;

use anyhow::{Context, Result};
use parley_agent::history::{HistoryStore, MemoryHistoryStore, SqliteHistoryStore};
use parley_agent::llm::{LlmClient, ModelRegistry};
use parley_agent::prompt::PromptTemplates;
use parley_agent::tools::{AgentCatalog, AgentsFile, StaticToolRegistry};
use parley_agent::types::{ChunkKind, MsgChunk};
use parley_agent::EngineContext;
use parley_core::config::{EngineConfig, LlmConfig, SamplingConfig, StoreConfig};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::cli::EngineArgs;

/// Outbound channel depth; the engine waits when the terminal falls behind.
const CHANNEL_CAPACITY: usize = 32;

/// Everything a conversation command needs.
pub struct Engine {
    pub ctx: EngineContext,
    pub agents: Arc<AgentCatalog>,
    pub prompts: PromptTemplates,
    pub model: Option<String>,
}

impl Engine {
    pub fn from_args(args: &EngineArgs) -> Result<Self> {
        let mut llm = LlmConfig::from_env();
        if let Some(vendor) = &args.vendor {
            llm.vendor = vendor.trim().to_lowercase();
        }
        if args.model.is_some() {
            llm.model = args.model.clone();
        }
        let engine = EngineConfig::from_env();
        let models = Arc::new(ModelRegistry::builtin());
        let client = LlmClient::from_config(&llm, SamplingConfig::from_env(), &engine, &models)
            .context("Failed to create LLM client")?;

        let history: Arc<dyn HistoryStore> = if args.memory {
            Arc::new(MemoryHistoryStore::new(engine.history_pairs))
        } else {
            let path = args
                .db
                .clone()
                .unwrap_or_else(|| StoreConfig::from_env().db_path);
            Arc::new(SqliteHistoryStore::open(&path)?)
        };

        let (registry, catalog, prompts) = match &args.agents {
            Some(path) => {
                let file = AgentsFile::load(path)?;
                let (registry, catalog) = file.build()?;
                (registry, catalog, PromptTemplates::with_overrides(&file.prompts))
            }
            None => (
                StaticToolRegistry::new(),
                AgentCatalog::new(),
                PromptTemplates::default(),
            ),
        };
        tracing::debug!(
            vendor = %client.vendor(),
            agents = catalog.len(),
            tools = registry.len(),
            "engine ready"
        );

        let ctx = EngineContext::new(Arc::new(client), engine)
            .with_models(models)
            .with_tools(Arc::new(registry))
            .with_history(history);
        Ok(Self {
            ctx,
            agents: Arc::new(catalog),
            prompts,
            model: llm.model,
        })
    }
}

/// Channel plus the task that prints what arrives on it.
pub fn terminal_adapter() -> (mpsc::Sender<MsgChunk>, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    (tx, tokio::spawn(print_chunks(rx)))
}

/// Answers go to stdout as they arrive; notices and errors go to stderr.
async fn print_chunks(mut rx: mpsc::Receiver<MsgChunk>) {
    let mut stdout = tokio::io::stdout();
    let mut dangling = false;
    while let Some(chunk) = rx.recv().await {
        match chunk.kind {
            ChunkKind::Answer => {
                let mut out = chunk.content;
                if chunk.finished {
                    out.push('\n');
                }
                dangling = !chunk.finished;
                if stdout.write_all(out.as_bytes()).await.is_err() {
                    return;
                }
                let _ = stdout.flush().await;
            }
            ChunkKind::Notice => eprintln!("\n{}", chunk.content),
            ChunkKind::Error => {
                if dangling {
                    let _ = stdout.write_all(b"\n").await;
                    let _ = stdout.flush().await;
                    dangling = false;
                }
                eprintln!("error: {}", chunk.content);
            }
        }
    }
}
