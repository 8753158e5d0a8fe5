//! Extract Command
//!
//! Reads a text or markdown file, runs extraction and prints a report or JSON.
//!
//! Usage:
//!   ruleforge extract <file> [--schema S] [--batch] [--no-llm] [--no-fallback]
//!                            [--min-confidence F] [--json] [--output PATH]

use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cli::ui::Output;
use crate::config::{Config, ConfigLoader};
use crate::constants::llm as llm_constants;
use crate::extraction::{KnowledgeExtractor, TextChunker};
use crate::types::{BusinessRule, ExtractError, ExtractRequest, ExtractResult, Result};

pub struct ExtractArgs {
    pub file: PathBuf,
    pub schema: String,
    pub batch: bool,
    pub no_llm: bool,
    pub no_fallback: bool,
    pub min_confidence: Option<f64>,
    pub json: bool,
    pub output: Option<PathBuf>,
}

pub async fn run(args: ExtractArgs) -> Result<()> {
    let config = ConfigLoader::load()?;
    let text = tokio::fs::read_to_string(&args.file).await?;

    let mut options = config.extraction.options();
    if args.no_llm {
        options.use_llm = false;
    }
    if args.no_fallback {
        options.use_fallback = false;
    }
    if let Some(min) = args.min_confidence {
        if !(0.0..=1.0).contains(&min) {
            return Err(ExtractError::validation(
                "min_confidence",
                format!("must be between 0.0 and 1.0, got {}", min),
            ));
        }
        options.min_confidence = min;
    }

    let rounds = if args.batch {
        let chunks = TextChunker::new(config.extraction.chunk_max_tokens)
            .chunk(&text, 0)
            .len();
        chunks.div_ceil(config.extraction.batch_concurrency.max(1))
    } else {
        1
    };
    let deadline = overall_deadline(&config, rounds);

    let extractor = KnowledgeExtractor::from_config(&config)?;
    let req = ExtractRequest::new(text)
        .with_source(args.file.display().to_string())
        .with_schema(args.schema)
        .with_options(options);

    let cancel = CancellationToken::new();
    let watchdog = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(deadline) => {
                    warn!("Deadline of {:?} reached, cancelling extraction", deadline);
                }
                _ = tokio::signal::ctrl_c() => {
                    warn!("Interrupted, cancelling extraction");
                }
            }
            cancel.cancel();
        })
    };

    let outcome = if args.batch {
        extractor.extract_batch(&req, &cancel).await
    } else {
        extractor.extract(&req, &cancel).await
    };
    watchdog.abort();

    let mut result = outcome?;
    let hidden = apply_min_confidence(&mut result, options.min_confidence);

    if let Some(path) = &args.output {
        tokio::fs::write(path, serde_json::to_string_pretty(&result)?).await?;
        Output::new().success(&format!("Wrote result to {}", path.display()));
    } else if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_report(&result, hidden, options.min_confidence);
    }

    let stats = extractor.breaker_stats();
    if stats.blocked_count > 0 {
        warn!("{}", stats.summary());
    }

    Ok(())
}

/// Keep only rules at or above `min_confidence`; returns how many were hidden
fn apply_min_confidence(result: &mut ExtractResult, min_confidence: f64) -> usize {
    let kept: Vec<BusinessRule> = result
        .filter_by_confidence(min_confidence)
        .into_iter()
        .cloned()
        .collect();
    let hidden = result.business_rules.len() - kept.len();
    result.business_rules = kept;
    hidden
}

/// Time a whole run may take before the token is cancelled
fn overall_deadline(config: &Config, rounds: usize) -> Duration {
    let attempts = u64::from(config.extraction.max_attempts.max(1));
    let per_request = config.llm.timeout_secs.saturating_mul(attempts)
        + config.retry.max_delay_secs.saturating_mul(attempts - 1);
    let secs = per_request
        .saturating_mul(rounds.max(1) as u64)
        .min(llm_constants::MAX_DEADLINE_SECS);
    Duration::from_secs(secs)
}

fn print_report(result: &ExtractResult, hidden: usize, min_confidence: f64) {
    let output = Output::new();

    output.header("Extraction Result");
    output.item(&format!("Source:     {}", result.source));
    output.item(&format!(
        "Confidence: {}",
        output.confidence(result.confidence)
    ));
    output.item(&format!("Tokens:     {}", result.metadata.tokens_used));
    output.item(&format!(
        "Cache:      {}",
        if result.metadata.cache_hit { "hit" } else { "miss" }
    ));
    output.item(&format!("Time:       {}ms", result.metadata.processing_ms));

    if !result.business_rules.is_empty() || hidden > 0 {
        output.section(&format!("Business Rules ({})", result.business_rules.len()));
        for rule in &result.business_rules {
            output.item(&format!(
                "{} [{}] {}  ({})",
                rule.id,
                rule.priority,
                rule.title,
                output.confidence(rule.confidence)
            ));
        }
        if hidden > 0 {
            output.info(&format!(
                "{} rules below confidence {:.2} hidden",
                hidden, min_confidence
            ));
        }
    }

    if !result.entities.is_empty() {
        output.section(&format!("Entities ({})", result.entities.len()));
        for entity in &result.entities {
            output.item(&format!("{} ({} fields)", entity.name, entity.fields.len()));
        }
    }

    if !result.api_contracts.is_empty() {
        output.section(&format!("API Contracts ({})", result.api_contracts.len()));
        for contract in &result.api_contracts {
            output.item(&format!("{} {}", contract.method, contract.endpoint));
        }
    }

    if !result.user_journeys.is_empty() {
        output.section(&format!("User Journeys ({})", result.user_journeys.len()));
        for journey in &result.user_journeys {
            output.item(&format!("{} ({} steps)", journey.name, journey.steps.len()));
        }
    }

    if !result.glossary.is_empty() {
        output.section(&format!("Glossary ({})", result.glossary.len()));
        for term in &result.glossary {
            output.item(&format!("{}: {}", term.term, term.definition));
        }
    }

    if !result.errors.is_empty() {
        output.section(&format!("Issues ({})", result.errors.len()));
        for issue in &result.errors {
            output.warning(&format!("{}: {}", issue.code, issue.message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_scales_and_is_bounded() {
        let config = Config::default();
        // 120s x 3 attempts + 30s x 2 backoffs
        assert_eq!(overall_deadline(&config, 1), Duration::from_secs(420));
        assert_eq!(overall_deadline(&config, 2), Duration::from_secs(840));
        assert_eq!(
            overall_deadline(&config, 100),
            Duration::from_secs(llm_constants::MAX_DEADLINE_SECS)
        );
    }

    #[test]
    fn test_min_confidence_hides_weak_rules() {
        let rule = |id: &str, confidence: f64| BusinessRule {
            id: id.to_string(),
            confidence,
            ..Default::default()
        };
        let mut result = ExtractResult {
            business_rules: vec![rule("BR-001", 0.9), rule("BR-002", 0.3), rule("BR-003", 0.5)],
            ..Default::default()
        };

        let hidden = apply_min_confidence(&mut result, 0.5);

        assert_eq!(hidden, 1);
        let ids: Vec<&str> = result.business_rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["BR-001", "BR-003"]);
        assert_eq!(apply_min_confidence(&mut result, 0.0), 0);
    }
}
