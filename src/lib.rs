//! ruleforge - LLM-Driven Business Knowledge Extraction
//!
//! Turns free-form requirement documents into structured business rules,
//! entities, API contracts, user journeys and glossary terms.
//!
//! ## Core Features
//!
//! - **Resilient LLM Calls**: retry with backoff, circuit breaker, cancellation
//! - **Response Cache**: memory or file backend keyed by text and schema
//! - **Regex Fallback**: deterministic rule extraction when the LLM fails
//! - **Confidence Scoring**: weighted rule quality score in [0, 1]
//! - **Batch Mode**: chunked extraction with cross-chunk de-duplication
//!
//! ## Quick Start
//!
//! ```ignore
//! use ruleforge::{Config, ExtractRequest, KnowledgeExtractor};
//! use tokio_util::sync::CancellationToken;
//!
//! let extractor = KnowledgeExtractor::from_config(&Config::default())?;
//! let request = ExtractRequest::new("The system must lock an account after 5 failed logins.");
//! let result = extractor.extract(&request, &CancellationToken::new()).await?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: prompts, LLM clients, retry and breaker, response validation
//! - [`cache`]: response cache backends
//! - [`extraction`]: chunker, fallback, orchestrator and batch mode
//! - [`config`]: layered configuration

pub mod ai;
pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod extraction;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

pub use config::{Config, ConfigLoader};

pub use types::error::{ErrorCategory, ExtractError, Result};
pub use types::{ExtractOptions, ExtractRequest, ExtractResult, ExtractionSource, SchemaType};

pub use cache::{FileCache, MemoryCache, ResponseCache, SharedCache};

pub use extraction::{FallbackExtractor, KnowledgeExtractor, TextChunker};

pub use ai::{
    CircuitBreaker, ConfidenceScorer, LlmClient, LlmReply, ResponseParser, RetryingInvoker,
    SharedClient,
};
