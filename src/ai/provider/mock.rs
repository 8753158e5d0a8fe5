//! Scripted LLM client for tests

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{LlmClient, LlmReply};
use crate::types::{ExtractError, Result};

pub(crate) const MOCK_TOKENS: u64 = 100;

type Scripted = std::result::Result<String, String>;

/// Replays scripted outcomes in order; the last one repeats once the script runs out
pub(crate) struct MockClient {
    script: Mutex<VecDeque<Scripted>>,
    calls: AtomicU32,
    delay: Option<Duration>,
}

impl MockClient {
    pub fn scripted(outcomes: Vec<std::result::Result<&str, &str>>) -> Self {
        Self {
            script: Mutex::new(
                outcomes
                    .into_iter()
                    .map(|o| o.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            calls: AtomicU32::new(0),
            delay: None,
        }
    }

    pub fn ok(content: &str) -> Self {
        Self::scripted(vec![Ok(content)])
    }

    pub fn failing(message: &str) -> Self {
        Self::scripted(vec![Err(message)])
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> Scripted {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script
                .front()
                .cloned()
                .unwrap_or_else(|| Err("mock script is empty".to_string()))
        }
    }
}

#[async_trait]
impl LlmClient for MockClient {
    async fn call(&self, _prompt: &str, _task_type: &str) -> Result<LlmReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.next_outcome() {
            Ok(content) => Ok(LlmReply::new(content, MOCK_TOKENS)),
            Err(message) => Err(ExtractError::llm(message)),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
