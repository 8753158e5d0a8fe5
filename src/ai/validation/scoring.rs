//! Confidence Scoring for extracted rules
//!
//! Deterministic score in `[0, 1]` built from four weighted signals:
//!
//! | Signal        | Weight | Measures                                  |
//! |---------------|--------|-------------------------------------------|
//! | Structure     | 0.30   | id, title, description, priority, status  |
//! | Semantics     | 0.20   | actionable wording, numbers, length       |
//! | Traceability  | 0.25   | source document or quote present          |
//! | Constraints   | 0.25   | constraints, pseudocode, typed constraints |
//!
//! Each signal and the total are capped at 1.0.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::BusinessRule;

const STRUCTURE_WEIGHT: f64 = 0.30;
const SEMANTICS_WEIGHT: f64 = 0.20;
const TRACEABILITY_WEIGHT: f64 = 0.25;
const CONSTRAINTS_WEIGHT: f64 = 0.25;

const ACTION_WORDS: [&str; 6] = ["must", "shall", "should", "will", "can", "may"];

/// Coarse classification of a confidence score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    /// `>= 0.8` high, `>= 0.5` medium, otherwise low
    pub fn classify(score: f64) -> Self {
        if score >= 0.8 {
            Self::High
        } else if score >= 0.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ConfidenceScorer;

impl ConfidenceScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score_rule(&self, rule: &BusinessRule) -> f64 {
        let score = structure_score(rule) * STRUCTURE_WEIGHT
            + semantic_score(rule) * SEMANTICS_WEIGHT
            + traceability_score(rule) * TRACEABILITY_WEIGHT
            + constraint_score(rule) * CONSTRAINTS_WEIGHT;
        score.min(1.0)
    }

    /// Mean confidence; a rule's own positive confidence is trusted as-is
    pub fn score_overall(&self, rules: &[BusinessRule]) -> f64 {
        if rules.is_empty() {
            return 0.0;
        }

        let total: f64 = rules
            .iter()
            .map(|rule| {
                if rule.confidence > 0.0 {
                    rule.confidence.min(1.0)
                } else {
                    self.score_rule(rule)
                }
            })
            .sum();

        total / rules.len() as f64
    }
}

fn structure_score(rule: &BusinessRule) -> f64 {
    let mut score = 0.0;
    if !rule.id.is_empty() {
        score += 0.15;
    }
    if !rule.title.is_empty() {
        score += 0.35;
    }
    if rule.description.chars().count() > 20 {
        score += 0.40;
    }
    if !rule.priority.is_empty() {
        score += 0.05;
    }
    if !rule.status.is_empty() {
        score += 0.05;
    }
    f64::min(score, 1.0)
}

fn semantic_score(rule: &BusinessRule) -> f64 {
    if rule.description.is_empty() {
        return 0.0;
    }

    let desc = rule.description.to_lowercase();
    let mut score = 0.0;

    if ACTION_WORDS.iter().any(|word| desc.contains(word)) {
        score += 0.3;
    }
    if desc.chars().any(|c| c.is_ascii_digit()) {
        score += 0.3;
    }
    if rule.description.chars().count() >= 20 {
        score += 0.5;
    }
    f64::min(score, 1.0)
}

fn traceability_score(rule: &BusinessRule) -> f64 {
    let trace = &rule.traceability;
    if !trace.source_document.is_empty() || !trace.source_quote.is_empty() {
        1.0
    } else {
        0.0
    }
}

fn constraint_score(rule: &BusinessRule) -> f64 {
    let constraints = &rule.specification.constraints;
    if constraints.is_empty() {
        return 0.0;
    }

    let mut score = 0.7;
    if constraints.iter().any(|c| !c.pseudocode.is_empty()) {
        score += 0.3;
    } else if constraints.iter().any(|c| !c.constraint_type.is_empty()) {
        score += 0.2;
    }
    f64::min(score, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Constraint, Specification, Traceability};
    use proptest::prelude::*;

    fn complete_rule() -> BusinessRule {
        BusinessRule {
            id: "BR-001".to_string(),
            title: "Order limit".to_string(),
            description: "Orders must not exceed 100 items per customer".to_string(),
            priority: "high".to_string(),
            status: "draft".to_string(),
            specification: Specification {
                constraints: vec![Constraint {
                    id: "C1".to_string(),
                    constraint_type: "value_based".to_string(),
                    expression: "items <= 100".to_string(),
                    pseudocode: "if items > 100 { reject }".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            },
            traceability: Traceability {
                source_document: "orders.md".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_complete_rule_scores_high() {
        let score = ConfidenceScorer::new().score_rule(&complete_rule());
        assert!((score - 1.0).abs() < 1e-9);
        assert_eq!(ConfidenceLevel::classify(score), ConfidenceLevel::High);
    }

    #[test]
    fn test_empty_rule_scores_zero() {
        let score = ConfidenceScorer::new().score_rule(&BusinessRule::default());
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_component_weights() {
        // Title only: structure 0.35 * 0.30
        let rule = BusinessRule {
            title: "Only a title".to_string(),
            ..Default::default()
        };
        let score = ConfidenceScorer::new().score_rule(&rule);
        assert!((score - 0.105).abs() < 1e-9);

        // Typed constraint without pseudocode: constraints 0.9 * 0.25
        let rule = BusinessRule {
            specification: Specification {
                constraints: vec![Constraint {
                    constraint_type: "state_based".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            },
            ..Default::default()
        };
        let score = ConfidenceScorer::new().score_rule(&rule);
        assert!((score - 0.225).abs() < 1e-9);
    }

    #[test]
    fn test_overall_uses_preset_confidence() {
        let scorer = ConfidenceScorer::new();
        assert_eq!(scorer.score_overall(&[]), 0.0);

        let preset = BusinessRule {
            confidence: 0.5,
            ..Default::default()
        };
        let computed = complete_rule();
        let overall = scorer.score_overall(&[preset, computed]);
        assert!((overall - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(ConfidenceLevel::classify(0.8), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::classify(0.79), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::classify(0.5), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::classify(0.49), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::Medium.to_string(), "medium");
    }

    fn arb_rule() -> impl Strategy<Value = BusinessRule> {
        (
            ".{0,12}",
            ".{0,40}",
            ".{0,80}",
            proptest::option::of(".{0,20}"),
            proptest::collection::vec((".{0,10}", ".{0,10}"), 0..3),
            -1.0f64..2.0,
        )
            .prop_map(|(id, title, description, source, constraints, confidence)| {
                BusinessRule {
                    id,
                    title,
                    description,
                    confidence,
                    specification: Specification {
                        constraints: constraints
                            .into_iter()
                            .map(|(constraint_type, pseudocode)| Constraint {
                                constraint_type,
                                pseudocode,
                                ..Default::default()
                            })
                            .collect(),
                        ..Default::default()
                    },
                    traceability: Traceability {
                        source_document: source.unwrap_or_default(),
                        ..Default::default()
                    },
                    ..Default::default()
                }
            })
    }

    proptest! {
        #[test]
        fn prop_rule_score_in_unit_interval(rule in arb_rule()) {
            let score = ConfidenceScorer::new().score_rule(&rule);
            prop_assert!((0.0..=1.0).contains(&score));
        }

        #[test]
        fn prop_overall_score_in_unit_interval(rules in proptest::collection::vec(arb_rule(), 0..6)) {
            let score = ConfidenceScorer::new().score_overall(&rules);
            prop_assert!((0.0..=1.0).contains(&score));
        }
    }
}
