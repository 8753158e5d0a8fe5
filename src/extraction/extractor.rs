//! Knowledge Extractor
//!
//! Orchestrates a single extraction request:
//!
//! ```text
//! validate → cache lookup ─ hit ──────────────→ parse + score → return
//!                         └ miss → LLM (retry + breaker) → parse → score → store → return
//!                                   └ any failure → regex fallback (if allowed)
//! ```
//!
//! Collaborators are trait objects so tests can swap in scripted clients and
//! in-memory caches. Batch mode lives in `batch.rs`.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::chunker::TextChunker;
use super::fallback::FallbackExtractor;
use crate::ai::prompt::{ExtractionPrompts, SchemaPrompts};
use crate::ai::provider::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, RetryPolicy, RetryingInvoker,
    SharedClient, create_client,
};
use crate::ai::validation::{ConfidenceScorer, ResponseParser};
use crate::cache::{CacheStats, SharedCache, create_cache, fingerprint};
use crate::config::Config;
use crate::constants::{chunking, extraction as ext_constants, llm as llm_constants};
use crate::types::{
    ExtractError, ExtractRequest, ExtractResult, ExtractionSource, Result, SchemaType,
};

/// Limits applied by the extractor itself
#[derive(Debug, Clone, Copy)]
pub struct ExtractorSettings {
    /// Longest text accepted by `extract`, in characters
    pub max_text_chars: usize,
    /// Chunk budget used by `extract_batch`
    pub chunk_max_tokens: usize,
    /// Chunks extracted at the same time by `extract_batch`
    pub batch_concurrency: usize,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            max_text_chars: ext_constants::MAX_TEXT_CHARS,
            chunk_max_tokens: chunking::DEFAULT_MAX_TOKENS,
            batch_concurrency: ext_constants::BATCH_CONCURRENCY,
        }
    }
}

impl ExtractorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_text_chars: config.extraction.max_text_chars,
            chunk_max_tokens: config.extraction.chunk_max_tokens,
            batch_concurrency: config.extraction.batch_concurrency,
        }
    }
}

pub struct KnowledgeExtractor {
    invoker: RetryingInvoker,
    prompts: Arc<dyn ExtractionPrompts>,
    parser: ResponseParser,
    scorer: ConfidenceScorer,
    fallback: FallbackExtractor,
    cache: SharedCache,
    pub(super) chunker: TextChunker,
    pub(super) settings: ExtractorSettings,
}

impl KnowledgeExtractor {
    /// Extractor with default retry, breaker and limits
    pub fn new(client: SharedClient, cache: SharedCache) -> Self {
        let breaker = Arc::new(CircuitBreaker::with_defaults(client.name().to_string()));
        Self::from_parts(
            RetryingInvoker::new(client, breaker, RetryPolicy::default()),
            cache,
        )
    }

    /// Build client, cache, breaker and retry policy from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = create_client(&config.llm);
        let cache = create_cache(&config.cache)?;

        let breaker = Arc::new(CircuitBreaker::new(
            client.name().to_string(),
            CircuitBreakerConfig::from_settings(&config.circuit_breaker),
        ));
        let invoker = RetryingInvoker::new(client, breaker, RetryPolicy::from_config(config));

        Ok(Self::from_parts(invoker, cache).with_settings(ExtractorSettings::from_config(config)))
    }

    /// Extractor around an already configured invoker
    pub fn from_parts(invoker: RetryingInvoker, cache: SharedCache) -> Self {
        Self {
            invoker,
            prompts: Arc::new(SchemaPrompts),
            parser: ResponseParser::new(),
            scorer: ConfidenceScorer::new(),
            fallback: FallbackExtractor::new(),
            cache,
            chunker: TextChunker::default(),
            settings: ExtractorSettings::default(),
        }
    }

    pub fn with_prompts(mut self, prompts: Arc<dyn ExtractionPrompts>) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_settings(mut self, settings: ExtractorSettings) -> Self {
        self.chunker = TextChunker::new(settings.chunk_max_tokens);
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &ExtractorSettings {
        &self.settings
    }

    pub fn breaker_stats(&self) -> CircuitBreakerStats {
        self.invoker.breaker().stats()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // =========================================================================
    // Single Request
    // =========================================================================

    /// Extract knowledge from one request
    pub async fn extract(
        &self,
        req: &ExtractRequest,
        cancel: &CancellationToken,
    ) -> Result<ExtractResult> {
        let started = Instant::now();
        self.validate(req)?;

        let key = fingerprint(&req.text, cache_schema(req));
        if let Some(result) = self.lookup_cache(&key) {
            return Ok(finish(result, started));
        }

        if !req.options.use_llm {
            if !req.options.use_fallback {
                return Err(ExtractError::ExtractionDisabled);
            }
            debug!("LLM disabled for request, using regex fallback");
            return self.extract_with_fallback(req).map(|r| finish(r, started));
        }

        match self.extract_with_llm(req, &key, cancel).await {
            Ok(result) => Ok(finish(result, started)),
            Err(err) if req.options.use_fallback => {
                warn!(
                    client = %self.invoker.client_name(),
                    error = %err,
                    "LLM extraction failed, using regex fallback"
                );
                self.extract_with_fallback(req)
                    .map(|r| finish(r, started))
                    .map_err(ExtractError::all_methods_failed)
            }
            Err(err) => Err(ExtractError::all_methods_failed(err)),
        }
    }

    fn validate(&self, req: &ExtractRequest) -> Result<()> {
        if req.text.trim().is_empty() {
            return Err(ExtractError::validation("text", "text is required"));
        }
        if req.text.chars().count() > self.settings.max_text_chars {
            return Err(ExtractError::validation(
                "text",
                "text exceeds maximum length",
            ));
        }
        Ok(())
    }

    /// Parsed and scored cache entry; an entry that no longer parses is a miss
    fn lookup_cache(&self, key: &str) -> Option<ExtractResult> {
        let raw = self.cache.get(key)?;
        match self.parser.parse(&raw) {
            Ok(mut result) => {
                debug!(key, "Cache hit");
                self.score(&mut result, true);
                result.metadata.cache_hit = true;
                Some(result)
            }
            Err(e) => {
                debug!(key, error = %e, "Cached response no longer parses, ignoring");
                None
            }
        }
    }

    async fn extract_with_llm(
        &self,
        req: &ExtractRequest,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<ExtractResult> {
        let schema: SchemaType = req.schema()?;
        let prompt = self.prompts.build(schema, &req.text);

        let reply = self
            .invoker
            .call_with_retry(
                &prompt,
                llm_constants::EXTRACTION_TASK,
                self.invoker.policy().max_attempts,
                cancel,
            )
            .await?;

        let mut result = self.parser.parse(&reply.content)?;
        self.score(&mut result, false);
        result.metadata.tokens_used = reply.tokens_used;

        self.cache.set(key, &reply.content, reply.tokens_used);

        info!(
            schema = %schema,
            items = result.item_count(),
            tokens = reply.tokens_used,
            "LLM extraction complete"
        );
        Ok(result)
    }

    fn extract_with_fallback(&self, req: &ExtractRequest) -> Result<ExtractResult> {
        let mut result = self.fallback.extract(&req.text)?;
        for rule in &mut result.business_rules {
            rule.traceability.source_document = req.source.clone();
        }
        Ok(result)
    }

    /// Fill rule and overall confidence.
    ///
    /// Fresh responses are always re-scored; cached ones keep any confidence
    /// already present.
    fn score(&self, result: &mut ExtractResult, keep_existing: bool) {
        for rule in &mut result.business_rules {
            rule.confidence = if keep_existing && rule.confidence > 0.0 {
                rule.confidence.min(1.0)
            } else {
                self.scorer.score_rule(rule)
            };
        }
        result.confidence = self.overall_confidence(result);
        result.source = ExtractionSource::Llm;
    }

    pub(super) fn overall_confidence(&self, result: &ExtractResult) -> f64 {
        if !result.business_rules.is_empty() {
            self.scorer.score_overall(&result.business_rules)
        } else if result.is_empty() {
            0.0
        } else {
            ext_constants::NON_RULE_CONFIDENCE
        }
    }
}

/// Cache namespace for a request; an empty schema name means business rules
fn cache_schema(req: &ExtractRequest) -> &str {
    match req.schema_type.trim() {
        "" => SchemaType::BusinessRule.as_str(),
        name => name,
    }
}

fn finish(mut result: ExtractResult, started: Instant) -> ExtractResult {
    result.metadata.processed_at = Utc::now();
    result.metadata.processing_ms = started.elapsed().as_millis() as u64;
    result
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;
    use crate::ai::provider::mock::{MOCK_TOKENS, MockClient};
    use crate::cache::{MemoryCache, ResponseCache};
    use crate::types::ExtractOptions;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    pub(crate) const RULE_RESPONSE: &str = r#"```json
{
  "business_rules": [
    {
      "id": "BR-001",
      "title": "Refund window",
      "description": "Customers must request refunds within 30 days of purchase.",
      "priority": "high",
      "status": "draft",
      "specification": {
        "constraints": [
          {"id": "C1", "type": "time_based", "expression": "days <= 30", "pseudocode": "assert days <= 30"}
        ]
      },
      "traceability": {"source_document": "policy.md"}
    }
  ]
}
```"#;

    /// Memory cache that counts every call
    #[derive(Default)]
    pub(crate) struct CountingCache {
        inner: MemoryCache,
        pub gets: AtomicU32,
        pub sets: AtomicU32,
    }

    impl ResponseCache for CountingCache {
        fn get(&self, key: &str) -> Option<String> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str, tokens_used: u64) {
            self.sets.fetch_add(1, Ordering::SeqCst);
            self.inner.set(key, value, tokens_used);
        }

        fn clear(&self) -> Result<()> {
            self.inner.clear()
        }

        fn stats(&self) -> CacheStats {
            self.inner.stats()
        }
    }

    /// Extractor with millisecond backoff so retry tests stay fast
    pub(crate) fn extractor(
        client: Arc<MockClient>,
        cache: Arc<CountingCache>,
    ) -> KnowledgeExtractor {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            ..Default::default()
        };
        let invoker = RetryingInvoker::new(
            client,
            Arc::new(CircuitBreaker::with_defaults("test")),
            policy,
        );
        KnowledgeExtractor::from_parts(invoker, cache)
    }

    fn setup(client: MockClient) -> (Arc<MockClient>, Arc<CountingCache>, KnowledgeExtractor) {
        let client = Arc::new(client);
        let cache = Arc::new(CountingCache::default());
        let extractor = extractor(Arc::clone(&client), Arc::clone(&cache));
        (client, cache, extractor)
    }

    fn no_fallback() -> ExtractOptions {
        ExtractOptions {
            use_fallback: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_empty_text_rejected_before_any_call() {
        let (client, cache, extractor) = setup(MockClient::ok(RULE_RESPONSE));

        let err = extractor
            .extract(&ExtractRequest::new("   \n"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractError::Validation(_)));
        assert!(err.to_string().contains("text is required"));
        assert_eq!(client.calls(), 0);
        assert_eq!(cache.gets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_text_over_limit_rejected() {
        let (client, _cache, extractor) = setup(MockClient::ok(RULE_RESPONSE));
        let extractor = extractor.with_settings(ExtractorSettings {
            max_text_chars: 10,
            ..Default::default()
        });

        let err = extractor
            .extract(
                &ExtractRequest::new("The system must log access."),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("text exceeds maximum length"));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_llm_result_is_scored_and_cached() {
        let (client, cache, extractor) = setup(MockClient::ok(RULE_RESPONSE));
        let req = ExtractRequest::new("Customers must request refunds within 30 days.");
        let cancel = CancellationToken::new();

        let first = extractor.extract(&req, &cancel).await.unwrap();
        assert_eq!(first.source, ExtractionSource::Llm);
        assert!(!first.metadata.cache_hit);
        assert_eq!(first.metadata.tokens_used, MOCK_TOKENS);
        assert_eq!(first.business_rules.len(), 1);
        assert!(first.business_rules[0].confidence > 0.9);
        assert!(first.confidence > 0.9 && first.confidence <= 1.0);
        assert_eq!(cache.sets.load(Ordering::SeqCst), 1);

        let second = extractor.extract(&req, &cancel).await.unwrap();
        assert!(second.metadata.cache_hit);
        assert_eq!(second.business_rules, first.business_rules);
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_is_keyed_by_schema() {
        let (client, _cache, extractor) = setup(MockClient::ok(RULE_RESPONSE));
        let cancel = CancellationToken::new();
        let text = "Customers must request refunds within 30 days.";

        extractor
            .extract(&ExtractRequest::new(text), &cancel)
            .await
            .unwrap();
        extractor
            .extract(&ExtractRequest::new(text).with_schema("entity"), &cancel)
            .await
            .unwrap();

        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back_to_regex() {
        let (client, cache, extractor) = setup(MockClient::failing("invalid api key"));
        let req = ExtractRequest::new("The system must log every access.").with_source("ops.md");

        let result = extractor
            .extract(&req, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.source, ExtractionSource::Regex);
        assert_eq!(result.confidence, 0.5);
        assert_eq!(result.business_rules[0].traceability.source_document, "ops.md");
        // Permanent error: no retries
        assert_eq!(client.calls(), 1);
        assert_eq!(cache.sets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retryable_failure_uses_all_attempts_before_fallback() {
        let (client, _cache, extractor) = setup(MockClient::failing("503 service unavailable"));

        let result = extractor
            .extract(
                &ExtractRequest::new("The system must log every access."),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.source, ExtractionSource::Regex);
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn test_failure_without_fallback_is_combined_error() {
        let (_client, _cache, extractor) = setup(MockClient::failing("invalid api key"));
        let req = ExtractRequest::new("The system must log every access.").with_options(no_fallback());

        let err = extractor
            .extract(&req, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractError::AllMethodsFailed(_)));
        let message = err.to_string();
        assert!(message.starts_with("all extraction methods failed"));
        assert!(message.contains("invalid api key"));
    }

    #[tokio::test]
    async fn test_fallback_failure_wraps_fallback_error() {
        let (_client, _cache, extractor) = setup(MockClient::failing("invalid api key"));

        let err = extractor
            .extract(
                &ExtractRequest::new("Nothing normative here."),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        match err {
            ExtractError::AllMethodsFailed(inner) => {
                assert!(matches!(*inner, ExtractError::NoRulesFound))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_llm_disabled_uses_fallback_only() {
        let (client, _cache, extractor) = setup(MockClient::ok(RULE_RESPONSE));
        let req = ExtractRequest::new("Users cannot delete audit logs.").with_options(ExtractOptions {
            use_llm: false,
            ..Default::default()
        });

        let result = extractor
            .extract(&req, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.source, ExtractionSource::Regex);
        assert_eq!(result.business_rules[0].priority, "high");
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_everything_disabled() {
        let (client, _cache, extractor) = setup(MockClient::ok(RULE_RESPONSE));
        let req = ExtractRequest::new("The system must log every access.").with_options(
            ExtractOptions {
                use_llm: false,
                use_fallback: false,
                ..Default::default()
            },
        );

        let err = extractor
            .extract(&req, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractError::ExtractionDisabled));
        assert_eq!(err.to_string(), "extraction disabled and fallback not allowed");
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_schema_routes_through_fallback() {
        let (client, _cache, extractor) = setup(MockClient::ok(RULE_RESPONSE));
        let cancel = CancellationToken::new();
        let text = "The system must log every access.";

        let result = extractor
            .extract(&ExtractRequest::new(text).with_schema("invoices"), &cancel)
            .await
            .unwrap();
        assert_eq!(result.source, ExtractionSource::Regex);

        let err = extractor
            .extract(
                &ExtractRequest::new(text)
                    .with_schema("invoices")
                    .with_options(no_fallback()),
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unsupported schema type: invoices"));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_unparseable_response_is_not_cached() {
        let (client, cache, extractor) = setup(MockClient::ok("I could not find any rules."));
        let req = ExtractRequest::new("The system must log every access.");
        let cancel = CancellationToken::new();

        let result = extractor.extract(&req, &cancel).await.unwrap();
        assert_eq!(result.source, ExtractionSource::Regex);
        assert_eq!(cache.sets.load(Ordering::SeqCst), 0);

        extractor.extract(&req, &cancel).await.unwrap();
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn test_non_rule_schema_gets_fixed_confidence() {
        let (_client, _cache, extractor) = setup(MockClient::ok(
            r#"{"entities":[{"id":"ENT-001","name":"Order","fields":[{"name":"id","type":"string"}]}]}"#,
        ));

        let result = extractor
            .extract(
                &ExtractRequest::new("An order has an id.").with_schema("entity"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.confidence, 0.7);
    }

    #[tokio::test]
    async fn test_empty_response_scores_zero() {
        let (_client, _cache, extractor) = setup(MockClient::ok(r#"{"entities":[]}"#));

        let result = extractor
            .extract(
                &ExtractRequest::new("Nothing here.").with_schema("entity"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(result.is_empty());
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_cancelled_request_falls_back() {
        let (client, _cache, extractor) = setup(MockClient::ok(RULE_RESPONSE));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = extractor
            .extract(&ExtractRequest::new("The system must log every access."), &cancel)
            .await
            .unwrap();

        assert_eq!(result.source, ExtractionSource::Regex);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_cached_entry_that_no_longer_parses_is_a_miss() {
        let (client, cache, extractor) = setup(MockClient::ok(RULE_RESPONSE));
        let text = "Customers must request refunds within 30 days.";
        cache.set(&fingerprint(text, "business_rule"), "{broken", 10);

        let result = extractor
            .extract(&ExtractRequest::new(text), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!result.metadata.cache_hit);
        assert_eq!(result.source, ExtractionSource::Llm);
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_keeps_stored_rule_confidence() {
        let (client, cache, extractor) = setup(MockClient::ok(RULE_RESPONSE));
        let text = "Orders must ship within 2 days. Refunds must be approved by a manager.";
        let stored = r#"{
  "business_rules": [
    {"id": "BR-001", "title": "Shipping window", "description": "Orders must ship within 2 days.", "confidence": 0.42},
    {"id": "BR-002", "title": "Refund approval", "description": "Refunds must be approved by a manager.", "confidence": 1.7}
  ]
}"#;
        cache.set(&fingerprint(text, "business_rule"), stored, 10);

        let result = extractor
            .extract(&ExtractRequest::new(text), &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.metadata.cache_hit);
        assert_eq!(result.source, ExtractionSource::Llm);
        assert_eq!(result.business_rules.len(), 2);
        assert_eq!(result.business_rules[0].confidence, 0.42);
        assert_eq!(result.business_rules[1].confidence, 1.0);
        assert_eq!(client.calls(), 0);
    }
}
