//! Batch Extraction
//!
//! Chunks a large document, runs `extract` on every chunk with bounded
//! concurrency and merges the results in chunk order.
//!
//! ## Merge Rules
//!
//! - Business rules are de-duplicated by lower-cased description (title when
//!   the description is empty); first occurrence wins
//! - Other collections are de-duplicated by their natural key
//! - Rule ids that are empty or already taken are re-labelled `BR-NNN`
//! - A failed chunk becomes a `CHUNK_EXTRACTION_FAILED` issue; the batch only
//!   fails when every chunk does

use std::collections::HashSet;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::extractor::KnowledgeExtractor;
use crate::ai::validation::codes;
use crate::types::{
    BusinessRule, ExtractError, ExtractRequest, ExtractResult, ExtractionIssue, ExtractionSource,
    Result,
};

impl KnowledgeExtractor {
    /// Extract from a document of any length
    pub async fn extract_batch(
        &self,
        req: &ExtractRequest,
        cancel: &CancellationToken,
    ) -> Result<ExtractResult> {
        let started = Instant::now();

        if req.text.trim().is_empty() {
            return Err(ExtractError::validation("text", "text is required"));
        }

        let chunks = self.chunker.chunk(&req.text, self.settings.chunk_max_tokens);
        info!(
            chunks = chunks.len(),
            concurrency = self.settings.batch_concurrency,
            "Starting batch extraction"
        );

        let outcomes: Vec<Result<ExtractResult>> = stream::iter(chunks.into_iter().enumerate())
            .map(|(index, text)| {
                let chunk_req = ExtractRequest {
                    text,
                    source: format!("{}:chunk-{}", req.source, index),
                    schema_type: req.schema_type.clone(),
                    options: req.options,
                };
                async move { self.extract(&chunk_req, cancel).await }
            })
            .buffered(self.settings.batch_concurrency.max(1))
            .collect()
            .await;

        let total = outcomes.len();
        let mut successes = Vec::with_capacity(total);
        let mut issues = Vec::new();
        let mut first_error = None;

        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(result) => successes.push(result),
                Err(e) => {
                    warn!(chunk = index, error = %e, "Chunk extraction failed");
                    issues.push(ExtractionIssue::new(
                        codes::CHUNK_EXTRACTION_FAILED,
                        format!("chunk {} failed: {}", index, e),
                    ));
                    first_error.get_or_insert(e);
                }
            }
        }

        if successes.is_empty()
            && let Some(err) = first_error
        {
            return Err(err);
        }

        let mut merged = merge(successes);
        merged.errors.extend(issues);
        merged.confidence = self.overall_confidence(&merged);
        merged.metadata.processed_at = Utc::now();
        merged.metadata.processing_ms = started.elapsed().as_millis() as u64;

        debug!(
            chunks = total,
            items = merged.item_count(),
            issues = merged.errors.len(),
            "Batch extraction merged"
        );
        Ok(merged)
    }
}

/// Concatenate chunk results, de-duplicating every collection
fn merge(results: Vec<ExtractResult>) -> ExtractResult {
    let all_regex = results.iter().all(|r| r.source == ExtractionSource::Regex);
    let all_cached = results.iter().all(|r| r.metadata.cache_hit);

    let mut merged = ExtractResult {
        source: if all_regex {
            ExtractionSource::Regex
        } else {
            ExtractionSource::Llm
        },
        ..Default::default()
    };
    merged.metadata.cache_hit = all_cached;

    let mut rule_keys = HashSet::new();
    let mut entity_keys = HashSet::new();
    let mut contract_keys = HashSet::new();
    let mut journey_keys = HashSet::new();
    let mut term_keys = HashSet::new();

    for result in results {
        merged.metadata.tokens_used += result.metadata.tokens_used;
        merged.errors.extend(result.errors);

        for rule in result.business_rules {
            if is_new(&mut rule_keys, rule_key(&rule)) {
                merged.business_rules.push(rule);
            }
        }
        for entity in result.entities {
            if is_new(&mut entity_keys, entity.name.trim().to_lowercase()) {
                merged.entities.push(entity);
            }
        }
        for contract in result.api_contracts {
            let key = format!(
                "{} {}",
                contract.method.trim().to_uppercase(),
                contract.endpoint.trim().to_lowercase()
            );
            if is_new(&mut contract_keys, key) {
                merged.api_contracts.push(contract);
            }
        }
        for journey in result.user_journeys {
            if is_new(&mut journey_keys, journey.name.trim().to_lowercase()) {
                merged.user_journeys.push(journey);
            }
        }
        for term in result.glossary {
            if is_new(&mut term_keys, term.term.trim().to_lowercase()) {
                merged.glossary.push(term);
            }
        }
    }

    relabel_rule_ids(&mut merged.business_rules);
    merged
}

/// Records with a blank key are never treated as duplicates
fn is_new(seen: &mut HashSet<String>, key: String) -> bool {
    if key.trim().is_empty() {
        return true;
    }
    seen.insert(key)
}

fn rule_key(rule: &BusinessRule) -> String {
    let description = rule.description.trim();
    if description.is_empty() {
        rule.title.trim().to_lowercase()
    } else {
        description.to_lowercase()
    }
}

/// Give every rule a unique id, keeping the first holder of each id
fn relabel_rule_ids(rules: &mut [BusinessRule]) {
    let mut taken: HashSet<String> = rules
        .iter()
        .filter(|r| !r.id.is_empty())
        .map(|r| r.id.clone())
        .collect();
    let mut assigned = HashSet::new();
    let mut next = 1u32;

    for rule in rules.iter_mut() {
        if !rule.id.is_empty() && assigned.insert(rule.id.clone()) {
            continue;
        }

        let id = loop {
            let candidate = format!("BR-{:03}", next);
            next += 1;
            if !taken.contains(&candidate) {
                break candidate;
            }
        };
        debug!(old = %rule.id, new = %id, "Relabelled rule id");
        taken.insert(id.clone());
        assigned.insert(id.clone());
        rule.id = id;
    }
}
