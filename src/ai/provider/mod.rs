//! LLM Client Abstraction
//!
//! The extractor only sees `LlmClient`: a prompt goes in, raw text and a
//! token count come out. Provider wire formats live behind concrete clients.
//!
//! ## Modules
//!
//! - `command`: client that shells out to a local model runner
//! - `circuit_breaker`: fast-fail guard around a failing client
//! - `retry`: retrying invoker combining backoff, breaker and cancellation

mod circuit_breaker;
mod command;
mod retry;

#[cfg(test)]
pub(crate) mod mock;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState,
};
pub use command::CommandClient;
pub use retry::{RetryPolicy, RetryingInvoker};

pub use crate::types::{ErrorCategory, ErrorClassifier, LlmError};

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::types::{ExtractError, Result};

/// Raw completion plus usage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmReply {
    pub content: String,
    pub tokens_used: u64,
}

impl LlmReply {
    pub fn new(content: impl Into<String>, tokens_used: u64) -> Self {
        Self {
            content: content.into(),
            tokens_used,
        }
    }
}

/// LLM client contract
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Single-shot completion; retries are the caller's concern
    async fn call(&self, prompt: &str, task_type: &str) -> Result<LlmReply>;

    /// Client name for logging
    fn name(&self) -> &str;
}

pub type SharedClient = Arc<dyn LlmClient>;

/// Client used when no LLM is configured; every call fails permanently
pub struct DisabledClient;

#[async_trait]
impl LlmClient for DisabledClient {
    async fn call(&self, _prompt: &str, _task_type: &str) -> Result<LlmReply> {
        Err(ExtractError::Llm(LlmError::new(
            ErrorCategory::Permanent,
            "LLM client not configured",
        )))
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

/// Create a shared client from configuration
pub fn create_client(config: &LlmConfig) -> SharedClient {
    match config.command.as_deref() {
        Some(command) if !command.trim().is_empty() => Arc::new(CommandClient::new(config)),
        _ => Arc::new(DisabledClient),
    }
}
