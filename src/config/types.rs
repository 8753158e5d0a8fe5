//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/ruleforge/) and project (.ruleforge/) level configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::{
    cache as cache_constants, chunking, circuit_breaker as cb_constants, extraction,
    llm as llm_constants, retry as retry_constants,
};
use crate::types::{ExtractError, ExtractOptions, Result};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM client settings
    pub llm: LlmConfig,

    /// Extraction pipeline settings
    pub extraction: ExtractionConfig,

    /// Retry backoff settings
    pub retry: RetryConfig,

    /// Circuit breaker settings
    pub circuit_breaker: CircuitBreakerSettings,

    /// Response cache settings
    pub cache: CacheConfig,
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `ExtractError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if self.llm.timeout_secs == 0 {
            return Err(ExtractError::Config(
                "llm.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.extraction.min_confidence) {
            return Err(ExtractError::Config(format!(
                "extraction.min_confidence must be between 0.0 and 1.0, got {}",
                self.extraction.min_confidence
            )));
        }

        if self.extraction.max_attempts == 0 {
            return Err(ExtractError::Config(
                "extraction.max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.extraction.batch_concurrency == 0 {
            return Err(ExtractError::Config(
                "extraction.batch_concurrency must be greater than 0".to_string(),
            ));
        }

        if self.extraction.max_text_chars == 0 {
            return Err(ExtractError::Config(
                "extraction.max_text_chars must be greater than 0".to_string(),
            ));
        }

        if !(1.0..=retry_constants::MAX_BACKOFF_FACTOR).contains(&self.retry.backoff_factor) {
            return Err(ExtractError::Config(format!(
                "retry.backoff_factor must be between 1.0 and {}, got {}",
                retry_constants::MAX_BACKOFF_FACTOR,
                self.retry.backoff_factor
            )));
        }

        if self.retry.max_delay_secs > retry_constants::MAX_DELAY_CAP_SECS {
            return Err(ExtractError::Config(format!(
                "retry.max_delay_secs must be at most {}, got {}",
                retry_constants::MAX_DELAY_CAP_SECS,
                self.retry.max_delay_secs
            )));
        }

        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ExtractError::Config(
                "circuit_breaker.failure_threshold must be greater than 0".to_string(),
            ));
        }

        if self.cache.ttl_hours > cache_constants::MAX_TTL_HOURS {
            return Err(ExtractError::Config(format!(
                "cache.ttl_hours must be at most {}, got {}",
                cache_constants::MAX_TTL_HOURS,
                self.cache.ttl_hours
            )));
        }

        Ok(())
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Command that reads a prompt on stdin and writes the completion to stdout.
    /// Unset disables the LLM path.
    pub command: Option<String>,

    /// Extra arguments passed to the command
    pub args: Vec<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            timeout_secs: llm_constants::DEFAULT_TIMEOUT_SECS,
        }
    }
}

// =============================================================================
// Extraction Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub use_llm: bool,
    pub use_fallback: bool,

    /// Rules below this confidence are hidden from reports
    pub min_confidence: f64,

    /// LLM attempts per request, first try included
    pub max_attempts: u32,

    /// Chunk budget for batch mode
    pub chunk_max_tokens: usize,

    /// Chunks extracted at the same time in batch mode
    pub batch_concurrency: usize,

    /// Longest text accepted by a single extraction
    pub max_text_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            use_llm: true,
            use_fallback: true,
            min_confidence: extraction::DEFAULT_MIN_CONFIDENCE,
            max_attempts: retry_constants::MAX_ATTEMPTS,
            chunk_max_tokens: chunking::DEFAULT_MAX_TOKENS,
            batch_concurrency: extraction::BATCH_CONCURRENCY,
            max_text_chars: extraction::MAX_TEXT_CHARS,
        }
    }
}

impl ExtractionConfig {
    /// Per-request options seeded from configuration
    pub fn options(&self) -> ExtractOptions {
        ExtractOptions {
            use_llm: self.use_llm,
            use_fallback: self.use_fallback,
            min_confidence: self.min_confidence,
        }
    }
}

// =============================================================================
// Resilience Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub base_delay_ms: u64,
    pub max_delay_secs: u64,
    pub backoff_factor: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: retry_constants::BASE_DELAY_MS,
            max_delay_secs: retry_constants::MAX_DELAY_SECS,
            backoff_factor: retry_constants::BACKOFF_FACTOR,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: cb_constants::FAILURE_THRESHOLD,
            cooldown_secs: cb_constants::COOLDOWN_SECS,
        }
    }
}

// =============================================================================
// Cache Configuration
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    File,
    Memory,
}

impl std::fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackend::File => write!(f, "file"),
            CacheBackend::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,

    /// Directory for the file backend (defaults to the user cache directory)
    pub dir: Option<PathBuf>,

    pub ttl_hours: u64,

    /// Entry limit for the memory backend
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::File,
            dir: None,
            ttl_hours: cache_constants::DEFAULT_TTL_HOURS,
            capacity: cache_constants::DEFAULT_CAPACITY,
        }
    }
}
