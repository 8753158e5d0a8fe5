//! LLM Response Validation and Scoring
//!
//! - `json_repair`: fence stripping and trailing comma repair
//! - `response`: envelope parsing plus per-schema required-field findings
//! - `scoring`: deterministic confidence for business rules
//!
//! ## Design Philosophy
//! - Fail only when the JSON cannot be read at all
//! - Missing fields degrade the result, they never abort it

mod json_repair;
mod response;
mod scoring;

pub use json_repair::{remove_trailing_commas, strip_code_fences};
pub use response::{ResponseParser, codes};
pub use scoring::{ConfidenceLevel, ConfidenceScorer};
