//! Unified Error Type System
//!
//! Centralized error types for the extraction engine.
//! Provides error classification for retry decisions.
//!
//! ## Error Categories
//!
//! - **RateLimit**: Provider throttling (wait and retry)
//! - **Timeout**: Request exceeded its deadline (retry)
//! - **Network**: Connectivity issues (retry with backoff)
//! - **Unavailable**: 502/503 from an upstream gateway (retry)
//! - **Transient**: Provider reported a temporary condition (retry)
//! - **Permanent**: Everything else (fail fast)
//!
//! ## Propagation
//!
//! Failures on the LLM path are absorbed by the extractor and turned into a
//! fallback attempt. Only when fallback is disabled or also fails does a
//! terminal `AllMethodsFailed` surface to the caller.

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Error categories used for retry routing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    RateLimit,
    Timeout,
    Network,
    Unavailable,
    Transient,
    /// Not retried; returned to the caller immediately
    Permanent,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::Network => write!(f, "NETWORK"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Permanent => write!(f, "PERMANENT"),
        }
    }
}

impl ErrorCategory {
    /// Check if this category is worth another attempt
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Permanent)
    }
}

// =============================================================================
// LLM Error
// =============================================================================

/// LLM client failure with its retry category
#[derive(Debug, Clone)]
pub struct LlmError {
    pub category: ErrorCategory,
    pub message: String,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for LlmError {}

impl LlmError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Substring-based classifier for provider error messages
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify an error message from any LLM client.
    ///
    /// Matching is case-insensitive. Anything that does not match a known
    /// transient pattern is permanent.
    pub fn classify(message: &str) -> LlmError {
        let lower = message.to_lowercase();

        let category = if lower.contains("rate limit") || lower.contains("429") {
            ErrorCategory::RateLimit
        } else if lower.contains("timeout") {
            ErrorCategory::Timeout
        } else if lower.contains("network") || lower.contains("connection") {
            ErrorCategory::Network
        } else if lower.contains("503") || lower.contains("502") {
            ErrorCategory::Unavailable
        } else if lower.contains("temporary") {
            ErrorCategory::Transient
        } else {
            ErrorCategory::Permanent
        };

        LlmError::new(category, message)
    }

    /// Shorthand for `classify(message).is_retryable()`
    pub fn is_retryable_message(message: &str) -> bool {
        Self::classify(message).is_retryable()
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Request validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "validation failed for '{}': {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum ExtractError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Cache error: {0}")]
    Cache(String),

    // -------------------------------------------------------------------------
    // Input Errors
    // -------------------------------------------------------------------------
    #[error("invalid request: {0}")]
    Validation(ValidationError),

    #[error("unsupported schema type: {0}")]
    UnsupportedSchema(String),

    // -------------------------------------------------------------------------
    // LLM Path Errors
    // -------------------------------------------------------------------------
    #[error("LLM error: {0}")]
    Llm(LlmError),

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error("max retries ({attempts}) exceeded: {source}")]
    MaxRetriesExceeded {
        attempts: u32,
        #[source]
        source: Box<ExtractError>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("failed to parse JSON: {0}")]
    Parse(String),

    // -------------------------------------------------------------------------
    // Extraction Outcome Errors
    // -------------------------------------------------------------------------
    #[error("no business rules found via regex patterns")]
    NoRulesFound,

    #[error("extraction disabled and fallback not allowed")]
    ExtractionDisabled,

    #[error("all extraction methods failed: {0}")]
    AllMethodsFailed(#[source] Box<ExtractError>),
}

impl From<LlmError> for ExtractError {
    fn from(err: LlmError) -> Self {
        ExtractError::Llm(err)
    }
}

impl From<ValidationError> for ExtractError {
    fn from(err: ValidationError) -> Self {
        ExtractError::Validation(err)
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl ExtractError {
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create an LLM error, classifying the message
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(ErrorClassifier::classify(&message.into()))
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(ValidationError::new(field, message))
    }

    pub fn all_methods_failed(cause: ExtractError) -> Self {
        Self::AllMethodsFailed(Box::new(cause))
    }

    /// Check if another attempt could succeed.
    ///
    /// Structured variants decide by type; everything else falls back to
    /// message classification so wrapped IO or JSON errors from a client
    /// still route correctly.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Llm(e) => e.is_retryable(),
            Self::Timeout { .. } => true,
            Self::CircuitOpen
            | Self::Cancelled
            | Self::Validation(_)
            | Self::UnsupportedSchema(_)
            | Self::MaxRetriesExceeded { .. }
            | Self::AllMethodsFailed(_)
            | Self::ExtractionDisabled
            | Self::NoRulesFound => false,
            other => ErrorClassifier::is_retryable_message(&other.to_string()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_patterns() {
        let retryable = [
            "request timeout",
            "Rate limit exceeded",
            "temporary failure in name resolution",
            "network unreachable",
            "connection reset by peer",
            "upstream returned 503",
            "bad gateway 502",
            "HTTP 429",
        ];
        for msg in retryable {
            assert!(ErrorClassifier::is_retryable_message(msg), "{msg}");
        }

        let permanent = ["invalid api key", "malformed request", "model not found"];
        for msg in permanent {
            assert!(!ErrorClassifier::is_retryable_message(msg), "{msg}");
        }
    }

    #[test]
    fn test_classify_categories() {
        assert_eq!(
            ErrorClassifier::classify("429 Too Many Requests").category,
            ErrorCategory::RateLimit
        );
        assert_eq!(
            ErrorClassifier::classify("read TIMEOUT").category,
            ErrorCategory::Timeout
        );
        assert_eq!(
            ErrorClassifier::classify("Service Unavailable 503").category,
            ErrorCategory::Unavailable
        );
        assert_eq!(
            ErrorClassifier::classify("something else").category,
            ErrorCategory::Permanent
        );
    }

    #[test]
    fn test_error_is_retryable() {
        assert!(ExtractError::llm("connection refused").is_retryable());
        assert!(!ExtractError::llm("invalid prompt").is_retryable());
        assert!(ExtractError::timeout("llm call", Duration::from_secs(1)).is_retryable());
        assert!(!ExtractError::CircuitOpen.is_retryable());
        assert!(!ExtractError::Cancelled.is_retryable());
        assert!(!ExtractError::validation("text", "text is required").is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = ExtractError::MaxRetriesExceeded {
            attempts: 3,
            source: Box::new(ExtractError::llm("network down")),
        };
        assert_eq!(
            err.to_string(),
            "max retries (3) exceeded: LLM error: network down"
        );

        let err = ExtractError::all_methods_failed(ExtractError::NoRulesFound);
        assert_eq!(
            err.to_string(),
            "all extraction methods failed: no business rules found via regex patterns"
        );

        let err = ExtractError::validation("text", "text is required");
        assert_eq!(
            err.to_string(),
            "invalid request: validation failed for 'text': text is required"
        );
    }
}
