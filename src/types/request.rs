//! Extraction request and result types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ExtractError;
use super::knowledge::{ApiContract, BusinessRule, Entity, GlossaryTerm, UserJourney};
use crate::constants::extraction as ext_constants;

// =============================================================================
// Schema Type
// =============================================================================

/// Kind of knowledge a request asks for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SchemaType {
    #[default]
    BusinessRule,
    Entity,
    ApiContract,
    UserJourney,
    Glossary,
}

impl SchemaType {
    pub const ALL: [SchemaType; 5] = [
        SchemaType::BusinessRule,
        SchemaType::Entity,
        SchemaType::ApiContract,
        SchemaType::UserJourney,
        SchemaType::Glossary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::BusinessRule => "business_rule",
            SchemaType::Entity => "entity",
            SchemaType::ApiContract => "api_contract",
            SchemaType::UserJourney => "user_journey",
            SchemaType::Glossary => "glossary",
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SchemaType {
    type Err = ExtractError;

    /// An empty name selects business rules.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "business_rule" => Ok(SchemaType::BusinessRule),
            "entity" => Ok(SchemaType::Entity),
            "api_contract" => Ok(SchemaType::ApiContract),
            "user_journey" => Ok(SchemaType::UserJourney),
            "glossary" => Ok(SchemaType::Glossary),
            other => Err(ExtractError::UnsupportedSchema(other.to_string())),
        }
    }
}

// =============================================================================
// Request
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    pub use_llm: bool,
    pub use_fallback: bool,
    /// Consumers filter on this; the extractor itself never drops rules
    pub min_confidence: f64,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            use_llm: true,
            use_fallback: true,
            min_confidence: ext_constants::DEFAULT_MIN_CONFIDENCE,
        }
    }
}

/// A single extraction request.
///
/// `schema_type` stays a raw name so that an unknown schema is rejected on
/// the LLM path and can still be served by the fallback extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractRequest {
    pub text: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub schema_type: String,
    #[serde(default)]
    pub options: ExtractOptions,
}

impl ExtractRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: String::new(),
            schema_type: SchemaType::BusinessRule.as_str().to_string(),
            options: ExtractOptions::default(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema_type = schema.into();
        self
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    pub fn schema(&self) -> Result<SchemaType, ExtractError> {
        self.schema_type.parse()
    }
}

// =============================================================================
// Result
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionSource {
    #[default]
    Llm,
    Regex,
}

impl fmt::Display for ExtractionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionSource::Llm => write!(f, "llm"),
            ExtractionSource::Regex => write!(f, "regex"),
        }
    }
}

/// Non-fatal finding attached to a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionIssue {
    pub code: String,
    pub message: String,
}

impl ExtractionIssue {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionMetadata {
    pub processed_at: DateTime<Utc>,
    pub tokens_used: u64,
    pub cache_hit: bool,
    pub processing_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractResult {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub business_rules: Vec<BusinessRule>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<Entity>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub api_contracts: Vec<ApiContract>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_journeys: Vec<UserJourney>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub glossary: Vec<GlossaryTerm>,
    pub confidence: f64,
    pub source: ExtractionSource,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ExtractionIssue>,
    pub metadata: ExtractionMetadata,
}

impl ExtractResult {
    /// Total records across all collections
    pub fn item_count(&self) -> usize {
        self.business_rules.len()
            + self.entities.len()
            + self.api_contracts.len()
            + self.user_journeys.len()
            + self.glossary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }

    /// Business rules at or above `min_confidence`
    pub fn filter_by_confidence(&self, min_confidence: f64) -> Vec<&BusinessRule> {
        self.business_rules
            .iter()
            .filter(|r| r.confidence >= min_confidence)
            .collect()
    }
}
