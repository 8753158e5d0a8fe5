//! Response Parsing and Validation
//!
//! Turns a raw model reply into an [`ExtractResult`]:
//! - Markdown fences are stripped before parsing
//! - One trailing-comma repair pass is attempted when parsing fails
//! - `null` members are treated as absent
//! - Missing required fields become non-fatal [`ExtractionIssue`]s
//!
//! Only unparseable JSON is fatal.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::json_repair::{remove_trailing_commas, strip_code_fences};
use crate::types::{
    ApiContract, BusinessRule, Entity, ExtractError, ExtractResult, ExtractionIssue,
    ExtractionSource, GlossaryTerm, Result, UserJourney,
};

/// Issue codes attached to parsed results
pub mod codes {
    pub const MISSING_TITLE: &str = "MISSING_TITLE";
    pub const MISSING_CONSTRAINTS: &str = "MISSING_CONSTRAINTS";
    pub const DUPLICATE_ID: &str = "DUPLICATE_ID";
    pub const MISSING_NAME: &str = "MISSING_NAME";
    pub const MISSING_FIELDS: &str = "MISSING_FIELDS";
    pub const MISSING_ENDPOINT: &str = "MISSING_ENDPOINT";
    pub const MISSING_METHOD: &str = "MISSING_METHOD";
    pub const MISSING_STEPS: &str = "MISSING_STEPS";
    pub const MISSING_TERM: &str = "MISSING_TERM";
    pub const MISSING_DEFINITION: &str = "MISSING_DEFINITION";
    pub const CHUNK_EXTRACTION_FAILED: &str = "CHUNK_EXTRACTION_FAILED";
}

/// Every collection the model may return; absent keys are empty
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Envelope {
    business_rules: Vec<BusinessRule>,
    entities: Vec<Entity>,
    api_contracts: Vec<ApiContract>,
    user_journeys: Vec<UserJourney>,
    glossary: Vec<GlossaryTerm>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, raw: &str) -> Result<ExtractResult> {
        let cleaned = strip_code_fences(raw);

        let mut value = match serde_json::from_str::<Value>(&cleaned) {
            Ok(value) => value,
            Err(first) => {
                debug!(error = %first, "JSON parse failed, attempting trailing comma repair");
                serde_json::from_str::<Value>(&remove_trailing_commas(&cleaned))
                    .map_err(|e| ExtractError::Parse(e.to_string()))?
            }
        };

        drop_nulls(&mut value);
        let envelope: Envelope =
            serde_json::from_value(value).map_err(|e| ExtractError::Parse(e.to_string()))?;

        let mut errors = Vec::new();
        validate_rules(&envelope.business_rules, &mut errors);
        validate_entities(&envelope.entities, &mut errors);
        validate_api_contracts(&envelope.api_contracts, &mut errors);
        validate_journeys(&envelope.user_journeys, &mut errors);
        validate_glossary(&envelope.glossary, &mut errors);

        Ok(ExtractResult {
            business_rules: envelope.business_rules,
            entities: envelope.entities,
            api_contracts: envelope.api_contracts,
            user_journeys: envelope.user_journeys,
            glossary: envelope.glossary,
            source: ExtractionSource::Llm,
            errors,
            ..Default::default()
        })
    }
}

fn drop_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(drop_nulls);
        }
        Value::Array(items) => items.iter_mut().for_each(drop_nulls),
        _ => {}
    }
}

fn validate_rules(rules: &[BusinessRule], errors: &mut Vec<ExtractionIssue>) {
    let mut seen = HashSet::new();

    for (idx, rule) in rules.iter().enumerate() {
        if rule.title.trim().is_empty() {
            errors.push(ExtractionIssue::new(
                codes::MISSING_TITLE,
                format!("Rule {} missing required field: title", idx),
            ));
        }
        if rule.specification.constraints.is_empty() {
            errors.push(ExtractionIssue::new(
                codes::MISSING_CONSTRAINTS,
                format!("Rule {} has no constraints", rule.id),
            ));
        }
        if !rule.id.is_empty() && !seen.insert(rule.id.as_str()) {
            errors.push(ExtractionIssue::new(
                codes::DUPLICATE_ID,
                format!("Rule id {} appears more than once", rule.id),
            ));
        }
    }
}

fn validate_entities(entities: &[Entity], errors: &mut Vec<ExtractionIssue>) {
    for (idx, entity) in entities.iter().enumerate() {
        if entity.name.trim().is_empty() {
            errors.push(ExtractionIssue::new(
                codes::MISSING_NAME,
                format!("Entity {} missing required field: name", idx),
            ));
        }
        if entity.fields.is_empty() {
            errors.push(ExtractionIssue::new(
                codes::MISSING_FIELDS,
                format!("Entity {} has no fields", entity.id),
            ));
        }
    }
}

fn validate_api_contracts(contracts: &[ApiContract], errors: &mut Vec<ExtractionIssue>) {
    for (idx, contract) in contracts.iter().enumerate() {
        if contract.endpoint.trim().is_empty() {
            errors.push(ExtractionIssue::new(
                codes::MISSING_ENDPOINT,
                format!("API contract {} missing required field: endpoint", idx),
            ));
        }
        if contract.method.trim().is_empty() {
            errors.push(ExtractionIssue::new(
                codes::MISSING_METHOD,
                format!("API contract {} missing required field: method", contract.id),
            ));
        }
    }
}

fn validate_journeys(journeys: &[UserJourney], errors: &mut Vec<ExtractionIssue>) {
    for journey in journeys {
        if journey.steps.is_empty() {
            errors.push(ExtractionIssue::new(
                codes::MISSING_STEPS,
                format!("User journey {} has no steps", journey.id),
            ));
        }
    }
}

fn validate_glossary(terms: &[GlossaryTerm], errors: &mut Vec<ExtractionIssue>) {
    for (idx, term) in terms.iter().enumerate() {
        if term.term.trim().is_empty() {
            errors.push(ExtractionIssue::new(
                codes::MISSING_TERM,
                format!("Glossary term {} missing required field: term", idx),
            ));
        }
        if term.definition.trim().is_empty() {
            errors.push(ExtractionIssue::new(
                codes::MISSING_DEFINITION,
                format!("Glossary term {} missing required field: definition", term.id),
            ));
        }
    }
}
