//! Prompt Construction
//!
//! `PromptBuilder` assembles sectioned prompts; `SchemaPrompts` is the
//! default [`ExtractionPrompts`] implementation with one template per schema
//! type. Wording is free to change; only the JSON shape requested in the
//! output section has to match what `ResponseParser` reads.

use crate::types::SchemaType;

/// Builds the prompt sent to the LLM for one schema type
pub trait ExtractionPrompts: Send + Sync {
    fn build(&self, schema: SchemaType, text: &str) -> String;
}

/// Prompt section types
#[derive(Debug, Clone)]
pub enum PromptSection {
    /// Role definition with expertise area
    Role { expertise: String, task: String },
    /// Numbered objectives
    Objectives(Vec<String>),
    /// Raw text section with optional header
    Text {
        header: Option<String>,
        content: String,
    },
    /// Focus enforcement with restrictions
    Focus {
        target: String,
        restrictions: Vec<String>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    sections: Vec<PromptSection>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(mut self, expertise: &str, task: &str) -> Self {
        self.sections.push(PromptSection::Role {
            expertise: expertise.to_string(),
            task: task.to_string(),
        });
        self
    }

    pub fn objectives(mut self, objectives: &[&str]) -> Self {
        self.sections.push(PromptSection::Objectives(
            objectives.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    pub fn text(mut self, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: None,
            content: content.to_string(),
        });
        self
    }

    pub fn section(mut self, header: &str, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: Some(header.to_string()),
            content: content.to_string(),
        });
        self
    }

    pub fn focus(mut self, target: &str, restrictions: &[&str]) -> Self {
        self.sections.push(PromptSection::Focus {
            target: target.to_string(),
            restrictions: restrictions.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn build(self) -> String {
        let mut prompt = String::new();

        for section in self.sections {
            match section {
                PromptSection::Role { expertise, task } => {
                    prompt.push_str("<ROLE>\n");
                    prompt.push_str(&format!(
                        "You are an expert {} specializing in {}.\n",
                        expertise, task
                    ));
                    prompt.push_str("</ROLE>\n\n");
                }
                PromptSection::Objectives(objectives) => {
                    prompt.push_str("<OBJECTIVES>\n");
                    for (i, obj) in objectives.iter().enumerate() {
                        prompt.push_str(&format!("{}. {}\n", i + 1, obj));
                    }
                    prompt.push_str("</OBJECTIVES>\n\n");
                }
                PromptSection::Text { header, content } => {
                    if let Some(h) = header {
                        prompt.push_str(&format!("# {}\n\n", h));
                    }
                    prompt.push_str(&content);
                    prompt.push_str("\n\n");
                }
                PromptSection::Focus {
                    target,
                    restrictions,
                } => {
                    prompt.push_str("<FOCUS>\n");
                    prompt.push_str(&format!("IMPORTANT: Focus EXCLUSIVELY on: {}\n", target));
                    for restriction in restrictions {
                        prompt.push_str(&format!("- {}\n", restriction));
                    }
                    prompt.push_str("</FOCUS>\n\n");
                }
            }
        }

        prompt.trim_end().to_string()
    }
}

const BUSINESS_RULE_FORMAT: &str = r#"{
  "business_rules": [
    {
      "id": "BR-XXX",
      "version": "1.0",
      "status": "draft",
      "title": "Short descriptive title",
      "description": "Detailed description",
      "priority": "high|medium|low",
      "specification": {
        "trigger": "What initiates this rule",
        "preconditions": ["condition"],
        "constraints": [
          {
            "id": "C1",
            "type": "time_based|value_based|state_based",
            "expression": "Human readable expression",
            "pseudocode": "machine_checkable_expression",
            "boundary": "inclusive|exclusive",
            "unit": "hours|minutes|days|currency|count"
          }
        ],
        "exceptions": [{"id": "E1", "condition": "...", "modified_constraint": "..."}],
        "error_cases": [
          {"condition": "...", "error_code": "ERR_SNAKE_CASE", "error_message": "...", "http_status": 400}
        ]
      },
      "traceability": {"source_document": "...", "source_quote": "original text"},
      "confidence": 0.85
    }
  ]
}"#;

const ENTITY_FORMAT: &str = r#"{"entities":[{"id":"ENT-XXX","version":"1.0","status":"draft","name":"EntityName","description":"...","category":"domain_entity|value_object|aggregate_root","fields":[{"name":"field","type":"string","required":true}],"relationships":[{"entity":"Related","type":"one-to-many"}],"traceability":{"source_document":"..."}}]}"#;

const API_CONTRACT_FORMAT: &str = r#"{"api_contracts":[{"id":"API-XXX","version":"1.0","status":"draft","endpoint":"/api/path","method":"GET","description":"...","request":{"params":{}},"response":{"status_codes":{"200":{"description":"Success"}}},"traceability":{"source_document":"..."}}]}"#;

const USER_JOURNEY_FORMAT: &str = r#"{"user_journeys":[{"id":"UJ-XXX","version":"1.0","status":"draft","name":"Journey","actor":"User","goal":"...","description":"...","preconditions":[],"steps":[{"step":1,"actor_action":"...","system_response":"..."}],"postconditions":[],"traceability":{"source_document":"..."}}]}"#;

const GLOSSARY_FORMAT: &str = r#"{"glossary":[{"id":"GL-XXX","term":"Term","definition":"...","synonyms":[],"related_terms":[],"examples":[],"context":"...","traceability":{"source_document":"..."}}]}"#;

/// Default per-schema prompt templates
#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaPrompts;

impl SchemaPrompts {
    fn base(task: &str, objectives: &[&str], format: &str) -> PromptBuilder {
        PromptBuilder::new()
            .role("requirements analyst", task)
            .objectives(objectives)
            .focus(
                "statements present in the document text",
                &[
                    "Do NOT invent requirements the text does not state",
                    "Quote the original sentence in traceability.source_quote",
                ],
            )
            .section("Output Format (strict JSON)", format)
    }
}

impl ExtractionPrompts for SchemaPrompts {
    fn build(&self, schema: SchemaType, text: &str) -> String {
        let builder = match schema {
            SchemaType::BusinessRule => Self::base(
                "extracting business rules from project documents",
                &[
                    "Identify rules describing what the system MUST or MUST NOT do",
                    "Extract the trigger and preconditions of each rule",
                    "Extract constraints with exact boundaries and units",
                    "Extract exceptions and error cases",
                    "Write verifiable pseudocode for every constraint",
                ],
                BUSINESS_RULE_FORMAT,
            ),
            SchemaType::Entity => Self::base(
                "extracting domain entities",
                &[
                    "Identify each entity with its category",
                    "List fields with types and validation",
                    "List relationships to other entities",
                ],
                ENTITY_FORMAT,
            ),
            SchemaType::ApiContract => Self::base(
                "extracting API contracts",
                &[
                    "Identify every endpoint with its HTTP method",
                    "Describe request params, query and body",
                    "List response status codes",
                ],
                API_CONTRACT_FORMAT,
            ),
            SchemaType::UserJourney => Self::base(
                "extracting user journeys",
                &[
                    "Identify the actor and goal of each journey",
                    "List sequential steps with actor action and system response",
                    "Capture preconditions and postconditions",
                ],
                USER_JOURNEY_FORMAT,
            ),
            SchemaType::Glossary => Self::base(
                "extracting glossary terms",
                &[
                    "Identify domain terms with precise definitions",
                    "Capture synonyms, related terms and examples",
                ],
                GLOSSARY_FORMAT,
            ),
        };

        builder
            .section("Document Text", text)
            .text("Return ONLY valid JSON. Do not include markdown code fences.")
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_prompt() {
        let prompt = PromptBuilder::new()
            .role("requirements analyst", "business rules")
            .objectives(&["Find rules", "Write pseudocode"])
            .build();

        assert!(prompt.contains("<ROLE>"));
        assert!(prompt.contains("requirements analyst"));
        assert!(prompt.contains("1. Find rules"));
        assert!(prompt.contains("2. Write pseudocode"));
    }

    #[test]
    fn test_focus_section() {
        let prompt = PromptBuilder::new()
            .focus("the document", &["Do NOT speculate"])
            .build();

        assert!(prompt.contains("<FOCUS>"));
        assert!(prompt.contains("- Do NOT speculate"));
    }

    #[test]
    fn test_schema_prompts_request_matching_envelope() {
        let prompts = SchemaPrompts;
        let text = "Orders must ship within 2 days.";

        for (schema, key) in [
            (SchemaType::BusinessRule, "\"business_rules\""),
            (SchemaType::Entity, "\"entities\""),
            (SchemaType::ApiContract, "\"api_contracts\""),
            (SchemaType::UserJourney, "\"user_journeys\""),
            (SchemaType::Glossary, "\"glossary\""),
        ] {
            let prompt = prompts.build(schema, text);
            assert!(prompt.contains(key), "{schema} prompt lacks {key}");
            assert!(prompt.contains(text));
            assert!(prompt.ends_with("Do not include markdown code fences."));
        }
    }
}
