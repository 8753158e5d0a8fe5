//! Command LLM Client
//!
//! Runs a configured local command (a model runner or vendor CLI), writes the
//! prompt to its stdin and treats stdout as the completion.
//!
//! Note: Retry, timeout and circuit breaking are applied by `RetryingInvoker`.
//! This client performs single-shot execution only.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{LlmClient, LlmReply};
use crate::config::LlmConfig;
use crate::extraction::estimate_tokens;
use crate::types::{ExtractError, Result};

pub struct CommandClient {
    name: String,
    program: String,
    args: Vec<String>,
}

impl CommandClient {
    pub fn new(config: &LlmConfig) -> Self {
        let program = config.command.clone().unwrap_or_default();
        let name = std::path::Path::new(&program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&program)
            .to_string();

        Self {
            name,
            program,
            args: config.args.clone(),
        }
    }

    async fn execute(&self, prompt: &str) -> Result<LlmReply> {
        let start_time = Instant::now();

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExtractError::llm(format!("failed to spawn {}: {}", self.program, e)))?;

        // Feed stdin while stdout and stderr drain, or a full pipe blocks both sides.
        // Dropping stdin after the write closes the pipe so the command sees EOF.
        let stdin = child.stdin.take();
        let write_prompt = async move {
            match stdin {
                Some(mut stdin) => stdin.write_all(prompt.as_bytes()).await,
                None => Ok(()),
            }
        };
        let (written, output) = tokio::join!(write_prompt, child.wait_with_output());

        let output = output
            .map_err(|e| ExtractError::llm(format!("{} execution failed: {}", self.name, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                format!("{} exited with {}", self.name, output.status)
            } else {
                format!("{} failed: {}", self.name, stderr.trim())
            };
            return Err(ExtractError::llm(message));
        }

        // A runner may exit before reading all input; only a failed exit matters then
        if let Err(e) = written
            && e.kind() != std::io::ErrorKind::BrokenPipe
        {
            return Err(ExtractError::llm(format!(
                "failed to write prompt to {}: {}",
                self.name, e
            )));
        }

        let content = String::from_utf8_lossy(&output.stdout).into_owned();
        let tokens_used = (estimate_tokens(prompt) + estimate_tokens(&content)) as u64;

        debug!(
            client = %self.name,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            tokens_used,
            "Command client completed"
        );

        Ok(LlmReply::new(content, tokens_used))
    }
}

#[async_trait]
impl LlmClient for CommandClient {
    async fn call(&self, prompt: &str, task_type: &str) -> Result<LlmReply> {
        debug!(client = %self.name, task_type, "Calling command client");
        self.execute(prompt).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
