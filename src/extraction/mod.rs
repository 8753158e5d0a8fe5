//! Knowledge Extraction Pipeline
//!
//! - `chunker`: token-budgeted document splitting
//! - `fallback`: deterministic regex extraction
//! - `extractor`: single-request orchestration (cache, LLM, fallback)
//! - `batch`: chunked extraction with merge and de-duplication

mod batch;
mod chunker;
mod extractor;
mod fallback;

pub use chunker::{TextChunker, estimate_tokens};
pub use extractor::{ExtractorSettings, KnowledgeExtractor};
pub use fallback::FallbackExtractor;
