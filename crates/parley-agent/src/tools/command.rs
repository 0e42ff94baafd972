//! Tool client backed by a local command.
//!
//! The arguments object is written to the child's stdin as JSON; stdout
//! (trimmed) is the tool result. The tool name is exported as
//! `PARLEY_TOOL_NAME` so one script can serve several tools.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::ToolClient;

const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct CommandToolClient {
    program: String,
    args: Vec<String>,
    workdir: Option<PathBuf>,
    timeout: Duration,
}

impl CommandToolClient {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            workdir: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// `argv[0]` is the program, the rest are its arguments.
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let Some((program, rest)) = argv.split_first() else {
            bail!("empty tool command");
        };
        Ok(Self::new(program.clone()).with_args(rest.iter().cloned()))
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args.extend(args);
        self
    }

    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ToolClient for CommandToolClient {
    async fn exec_tool(&self, name: &str, args: &Map<String, Value>) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env("PARLEY_TOOL_NAME", name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn tool command: {}", self.program))?;

        let input = serde_json::to_vec(args)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&input)
                .await
                .context("Failed to write tool arguments")?;
            // dropping stdin closes the pipe so the child sees EOF
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(res) => res.context("Failed to wait for tool command")?,
            Err(_) => bail!("tool command timed out after {}s", self.timeout.as_secs()),
        };

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("tool command failed (exit {}): {}", code, stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
