//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Chunking constants
pub mod chunking {
    /// Default chunk budget in tokens
    pub const DEFAULT_MAX_TOKENS: usize = 4000;

    /// Characters per token used for budget approximation
    pub const CHARS_PER_TOKEN: usize = 4;
}

/// Retry constants
pub mod retry {
    /// Attempts per LLM call (first try included)
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 1000;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 30;

    /// Backoff multiplier
    pub const BACKOFF_FACTOR: f32 = 2.0;

    /// Largest accepted backoff multiplier
    pub const MAX_BACKOFF_FACTOR: f32 = 10.0;

    /// Largest accepted delay cap (seconds)
    pub const MAX_DELAY_CAP_SECS: u64 = 3600;
}

/// Circuit breaker constants
pub mod circuit_breaker {
    /// Consecutive failures before opening circuit
    pub const FAILURE_THRESHOLD: u32 = 5;

    /// Duration to wait before letting a probe through (seconds)
    pub const COOLDOWN_SECS: u64 = 30;
}

/// Cache constants
pub mod cache {
    /// Maximum entries in the memory cache
    pub const DEFAULT_CAPACITY: usize = 1000;

    /// Cache entry expiration (hours)
    pub const DEFAULT_TTL_HOURS: u64 = 24;

    /// Longest accepted entry lifetime (hours, ten years)
    pub const MAX_TTL_HOURS: u64 = 87_600;

    /// Key namespace version; bump to invalidate every cached response
    pub const KEY_VERSION: &str = "v1";
}

/// LLM client constants
pub mod llm {
    /// Per-request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    /// Task tag passed to the client for extraction calls
    pub const EXTRACTION_TASK: &str = "knowledge_extraction";

    /// Upper bound on the overall CLI deadline (seconds)
    pub const MAX_DEADLINE_SECS: u64 = 3600;
}

/// Extraction constants
pub mod extraction {
    /// Maximum characters accepted by a single `extract` call (~25K tokens)
    pub const MAX_TEXT_CHARS: usize = 100_000;

    /// Default minimum confidence for reporting rules
    pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.6;

    /// Confidence assigned to results of non-rule schemas
    pub const NON_RULE_CONFIDENCE: f64 = 0.7;

    /// Confidence assigned to every regex-extracted rule
    pub const FALLBACK_CONFIDENCE: f64 = 0.5;

    /// Chunks extracted concurrently in batch mode
    pub const BATCH_CONCURRENCY: usize = 4;
}
