//! Retrying LLM Invoker
//!
//! Wraps a raw client call with the circuit breaker, a per-request timeout,
//! retryable/permanent classification and exponential backoff with jitter.
//!
//! ## Strategy
//!
//! 1. Stop if the caller cancelled
//! 2. Run the call through the breaker, bounded by the request timeout
//! 3. Permanent errors (and an open breaker) return immediately
//! 4. Retryable errors back off and try again until attempts run out
//!
//! The in-flight call and the backoff sleep are both raced against the
//! cancellation token, so a cancelled caller never waits out a delay.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::circuit_breaker::CircuitBreaker;
use super::{LlmReply, SharedClient};
use crate::ai::timeout::with_timeout;
use crate::config::Config;
use crate::constants::{llm as llm_constants, retry as retry_constants};
use crate::types::{ExtractError, Result};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f32,
    /// Bound on a single attempt
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: retry_constants::MAX_ATTEMPTS,
            base_delay: Duration::from_millis(retry_constants::BASE_DELAY_MS),
            max_delay: Duration::from_secs(retry_constants::MAX_DELAY_SECS),
            backoff_factor: retry_constants::BACKOFF_FACTOR,
            request_timeout: Duration::from_secs(llm_constants::DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.extraction.max_attempts,
            base_delay: Duration::from_millis(config.retry.base_delay_ms),
            max_delay: Duration::from_secs(config.retry.max_delay_secs),
            backoff_factor: config.retry.backoff_factor,
            request_timeout: Duration::from_secs(config.llm.timeout_secs),
        }
    }
}

pub struct RetryingInvoker {
    client: SharedClient,
    breaker: Arc<CircuitBreaker>,
    policy: RetryPolicy,
}

impl RetryingInvoker {
    pub fn new(client: SharedClient, breaker: Arc<CircuitBreaker>, policy: RetryPolicy) -> Self {
        Self {
            client,
            breaker,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    /// Call the client, retrying transient failures up to `max_attempts` times
    pub async fn call_with_retry(
        &self,
        prompt: &str,
        task_type: &str,
        max_attempts: u32,
        cancel: &CancellationToken,
    ) -> Result<LlmReply> {
        let max_attempts = max_attempts.max(1);
        let mut current_delay = self.policy.base_delay;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(ExtractError::Cancelled);
            }

            debug!(
                client = %self.client.name(),
                attempt,
                max_attempts,
                "LLM attempt"
            );

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ExtractError::Cancelled),
                result = self.breaker.call(|| with_timeout(
                    self.policy.request_timeout,
                    self.client.call(prompt, task_type),
                    "LLM request",
                )) => result,
            };

            let err = match outcome {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) if !e.is_retryable() => {
                    warn!(
                        client = %self.client.name(),
                        attempt,
                        error = %e,
                        "LLM call failed permanently"
                    );
                    return Err(e);
                }
                Err(e) => e,
            };

            warn!(
                client = %self.client.name(),
                attempt,
                error = %err,
                "LLM call failed, retryable"
            );
            last_error = Some(err);

            if attempt < max_attempts {
                let delay = current_delay + random_jitter(current_delay);
                debug!(delay_ms = delay.as_millis() as u64, "Retrying after backoff");

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ExtractError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }

                current_delay = calculate_backoff(
                    current_delay,
                    self.policy.backoff_factor,
                    self.policy.max_delay,
                );
            }
        }

        let source = last_error.unwrap_or_else(|| ExtractError::llm("no attempt was made"));
        Err(ExtractError::MaxRetriesExceeded {
            attempts: max_attempts,
            source: Box::new(source),
        })
    }
}

/// Up to a quarter of the base delay, from the thread-local RNG
fn random_jitter(base_delay: Duration) -> Duration {
    let max_jitter_ms = (base_delay.as_millis() as u64) / 4;
    if max_jitter_ms == 0 {
        return Duration::ZERO;
    }
    let jitter_ms = rand::rng().random_range(0..max_jitter_ms);
    Duration::from_millis(jitter_ms)
}

/// Exponential backoff with cap; a delay too large to represent becomes the cap
fn calculate_backoff(current: Duration, factor: f32, max: Duration) -> Duration {
    Duration::try_from_secs_f32(current.as_secs_f32() * factor)
        .unwrap_or(max)
        .min(max)
}
