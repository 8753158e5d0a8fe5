//! Timeout helper for async operations
//!
//! Timeout errors carry "timeout" in their message, so the retry classifier
//! treats them as transient.

use std::future::Future;
use std::time::Duration;

use crate::types::{ExtractError, Result};

/// Execute an async operation with a timeout
///
/// # Example
///
/// ```ignore
/// let reply = with_timeout(
///     Duration::from_secs(30),
///     client.call(prompt, "knowledge_extraction"),
///     "LLM request"
/// ).await?;
/// ```
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(ExtractError::timeout(operation_name, timeout)),
    }
}
