//! Regex fallback extraction
//!
//! Deterministic rule extraction used when the LLM path is disabled or has
//! failed. Three ordered pattern families:
//!
//! 1. Obligations: "the system/user/application must|shall|should ..."
//! 2. Time limits: "within N hours|days|minutes|seconds"
//! 3. Prohibitions: "must not|shall not|cannot|should not ..."
//!
//! Matches are de-duplicated by their lower-cased full text, first match
//! wins. Rule ids come from a counter owned by the extractor instance.

use std::collections::HashSet;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use regex::{Captures, Regex};
use tracing::debug;

use crate::constants::extraction::FALLBACK_CONFIDENCE;
use crate::types::{
    BusinessRule, Constraint, ExtractError, ExtractResult, ExtractionMetadata, ExtractionSource,
    Result, Specification,
};

static OBLIGATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:the\s+)?(?:system|user|application)\s+(?:must|shall|should)\s+(.+?)(?:\.|$)")
        .expect("valid regex")
});

static TIME_LIMIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)within\s+(\d+)\s+(hours?|days?|minutes?|seconds?)").expect("valid regex")
});

static PROHIBITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:must\s+not|shall\s+not|cannot|should\s+not)\s+(.+?)(?:\.|$)")
        .expect("valid regex")
});

#[derive(Debug, Clone, Copy)]
enum PatternKind {
    Obligation,
    TimeLimit,
    Prohibition,
}

impl PatternKind {
    const ORDERED: [PatternKind; 3] = [Self::Obligation, Self::TimeLimit, Self::Prohibition];

    fn regex(self) -> &'static Regex {
        match self {
            Self::Obligation => &OBLIGATION,
            Self::TimeLimit => &TIME_LIMIT,
            Self::Prohibition => &PROHIBITION,
        }
    }
}

#[derive(Debug, Default)]
pub struct FallbackExtractor {
    next_id: AtomicU64,
}

impl FallbackExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extract(&self, text: &str) -> Result<ExtractResult> {
        let mut seen = HashSet::new();
        let mut rules = Vec::new();

        for kind in PatternKind::ORDERED {
            for caps in kind.regex().captures_iter(text) {
                let full = &caps[0];
                if !seen.insert(full.to_lowercase()) {
                    continue;
                }
                rules.push(self.build_rule(kind, &caps));
            }
        }

        if rules.is_empty() {
            return Err(ExtractError::NoRulesFound);
        }

        debug!(rules = rules.len(), "Regex fallback extracted rules");

        Ok(ExtractResult {
            business_rules: rules,
            confidence: FALLBACK_CONFIDENCE,
            source: ExtractionSource::Regex,
            metadata: ExtractionMetadata {
                processed_at: Utc::now(),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    fn next_rule_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        format!("BR-{:03}", n)
    }

    fn build_rule(&self, kind: PatternKind, caps: &Captures<'_>) -> BusinessRule {
        let full = caps[0].to_string();

        let (title, priority, constraint) = match kind {
            PatternKind::Obligation => {
                let clause = &caps[1];
                (
                    truncate(clause, 100),
                    "medium",
                    Constraint {
                        constraint_type: "state_based".to_string(),
                        expression: clause.to_string(),
                        ..Default::default()
                    },
                )
            }
            PatternKind::TimeLimit => {
                let (amount, unit) = (&caps[1], &caps[2]);
                (
                    format!("Time Constraint: {} {}", amount, unit),
                    "medium",
                    Constraint {
                        constraint_type: "time_based".to_string(),
                        expression: format!("Within {} {}", amount, unit),
                        boundary: "inclusive".to_string(),
                        unit: unit.strip_suffix('s').unwrap_or(unit).to_string(),
                        ..Default::default()
                    },
                )
            }
            PatternKind::Prohibition => {
                let clause = &caps[1];
                (
                    format!("Prohibition: {}", truncate(clause, 80)),
                    "high",
                    Constraint {
                        constraint_type: "state_based".to_string(),
                        expression: format!("NOT: {}", clause),
                        ..Default::default()
                    },
                )
            }
        };

        BusinessRule {
            id: self.next_rule_id(),
            version: "1.0".to_string(),
            status: "draft".to_string(),
            title,
            description: full,
            priority: priority.to_string(),
            specification: Specification {
                constraints: vec![Constraint {
                    id: "C1".to_string(),
                    ..constraint
                }],
                ..Default::default()
            },
            confidence: FALLBACK_CONFIDENCE,
            ..Default::default()
        }
    }
}

/// Shorten to `max` characters, ending in "..." when cut
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_obligations() {
        let extractor = FallbackExtractor::new();
        let result = extractor
            .extract("The system must validate all input. The user must authenticate before access.")
            .unwrap();

        assert!(result.business_rules.len() >= 2);
        assert_eq!(result.source, ExtractionSource::Regex);
        assert_eq!(result.confidence, 0.5);
        assert!(result.business_rules.iter().all(|r| r.confidence == 0.5));

        let first = &result.business_rules[0];
        assert_eq!(first.id, "BR-001");
        assert_eq!(first.title, "validate all input");
        assert_eq!(first.description, "The system must validate all input.");
        assert_eq!(first.version, "1.0");
        assert_eq!(first.status, "draft");
        assert_eq!(first.specification.constraints[0].id, "C1");
        assert_eq!(first.specification.constraints[0].constraint_type, "state_based");
    }

    #[test]
    fn test_no_rules_found() {
        let err = FallbackExtractor::new()
            .extract("This is just regular text with no business rules.")
            .unwrap_err();
        assert!(matches!(err, ExtractError::NoRulesFound));
        assert!(err.to_string().contains("no business rules found"));
    }

    #[test]
    fn test_time_constraint() {
        let result = FallbackExtractor::new()
            .extract("Refunds are processed within 3 days")
            .unwrap();

        let rule = &result.business_rules[0];
        assert_eq!(rule.title, "Time Constraint: 3 days");
        let constraint = &rule.specification.constraints[0];
        assert_eq!(constraint.constraint_type, "time_based");
        assert_eq!(constraint.expression, "Within 3 days");
        assert_eq!(constraint.unit, "day");
    }

    #[test]
    fn test_prohibition_is_high_priority() {
        let result = FallbackExtractor::new()
            .extract("Guests cannot modify settings.")
            .unwrap();

        let rule = &result.business_rules[0];
        assert_eq!(rule.priority, "high");
        assert_eq!(rule.title, "Prohibition: modify settings");
        assert_eq!(rule.specification.constraints[0].expression, "NOT: modify settings");
    }

    #[test]
    fn test_duplicates_collapse_case_insensitively() {
        let result = FallbackExtractor::new()
            .extract("The system must log access. THE SYSTEM MUST LOG ACCESS.")
            .unwrap();
        assert_eq!(result.business_rules.len(), 1);
    }

    #[test]
    fn test_ids_increment_per_instance() {
        let a = FallbackExtractor::new();
        let b = FallbackExtractor::new();

        a.extract("The system must log access.").unwrap();
        let second = a.extract("The system must log access.").unwrap();
        assert_eq!(second.business_rules[0].id, "BR-002");

        let fresh = b.extract("The system must log access.").unwrap();
        assert_eq!(fresh.business_rules[0].id, "BR-001");
    }

    #[test]
    fn test_concurrent_ids_are_unique() {
        let extractor = Arc::new(FallbackExtractor::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let extractor = Arc::clone(&extractor);
                std::thread::spawn(move || {
                    extractor
                        .extract("The system must log access.")
                        .unwrap()
                        .business_rules[0]
                        .id
                        .clone()
                })
            })
            .collect();

        let ids: HashSet<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(ids.len(), 8);
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate("short", 10), "short");
        let long = "é".repeat(120);
        let cut = truncate(&long, 100);
        assert_eq!(cut.chars().count(), 100);
        assert!(cut.ends_with("..."));
    }
}
