//! AI Integration Layer
//!
//! Everything between a document chunk and a parsed, scored result:
//! prompt construction, resilient LLM invocation, response validation.

pub mod prompt;
pub mod provider;
pub mod timeout;
pub mod validation;

pub use prompt::{ExtractionPrompts, PromptBuilder, PromptSection, SchemaPrompts};
pub use provider::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState, CommandClient,
    DisabledClient, LlmClient, LlmReply, RetryPolicy, RetryingInvoker, SharedClient,
    create_client,
};
pub use timeout::with_timeout;
pub use validation::{ConfidenceLevel, ConfidenceScorer, ResponseParser};
