//! Knowledge Records
//!
//! Structured records produced by extraction. Every record deserializes
//! leniently (`#[serde(default)]`) since LLM output routinely omits fields;
//! structural gaps are reported by the response validator instead.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Business Rules
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessRule {
    pub id: String,
    pub version: String,
    pub status: String,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub specification: Specification,
    pub traceability: Traceability,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Specification {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub trigger: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub preconditions: Vec<String>,
    pub constraints: Vec<Constraint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exceptions: Vec<RuleException>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub error_cases: Vec<ErrorCase>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraint {
    pub id: String,
    #[serde(rename = "type")]
    pub constraint_type: String,
    pub expression: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pseudocode: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub boundary: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub unit: String,
}

/// Condition under which a rule's constraint is relaxed or replaced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleException {
    pub id: String,
    pub condition: String,
    pub modified_constraint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorCase {
    pub condition: String,
    pub error_code: String,
    pub error_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

/// Link back to the source document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Traceability {
    pub source_document: String,
    pub source_section: String,
    pub source_quote: String,
}

impl Traceability {
    pub fn is_empty(&self) -> bool {
        self.source_document.is_empty()
            && self.source_section.is_empty()
            && self.source_quote.is_empty()
    }
}

// =============================================================================
// Entities
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Entity {
    pub id: String,
    pub version: String,
    pub status: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub fields: Vec<EntityField>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<Relationship>,
    pub traceability: Traceability,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub description: String,
    pub required: bool,
    pub unique: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub validation: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Relationship {
    pub entity: String,
    #[serde(rename = "type")]
    pub relation_type: String,
    pub foreign_key: String,
    pub inverse: String,
    pub cascade: String,
}

// =============================================================================
// API Contracts
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiContract {
    pub id: String,
    pub version: String,
    pub status: String,
    pub endpoint: String,
    pub method: String,
    pub description: String,
    pub request: RequestSchema,
    pub response: ResponseSchema,
    pub traceability: Traceability,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestSchema {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, FieldSchema>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, FieldSchema>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub body: BTreeMap<String, FieldSchema>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseSchema {
    pub status_codes: BTreeMap<String, StatusResponse>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSchema {
    #[serde(rename = "type")]
    pub field_type: String,
    pub required: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub validation: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusResponse {
    pub description: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub body: Value,
}

// =============================================================================
// User Journeys
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserJourney {
    pub id: String,
    pub version: String,
    pub status: String,
    pub name: String,
    pub actor: String,
    pub goal: String,
    pub description: String,
    pub preconditions: Vec<String>,
    pub postconditions: Vec<String>,
    pub steps: Vec<JourneyStep>,
    pub traceability: Traceability,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JourneyStep {
    pub step: u32,
    pub actor_action: String,
    pub system_response: String,
    pub validation: String,
    pub business_rules: Vec<String>,
    pub api_calls: Vec<String>,
}

// =============================================================================
// Glossary
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlossaryTerm {
    pub id: String,
    pub term: String,
    pub definition: String,
    pub context: String,
    pub synonyms: Vec<String>,
    pub related_terms: Vec<String>,
    pub examples: Vec<String>,
    pub traceability: Traceability,
}
