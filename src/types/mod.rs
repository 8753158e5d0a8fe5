pub mod error;
pub mod knowledge;
pub mod request;

pub use error::{
    ErrorCategory, ErrorClassifier, ExtractError, LlmError, Result, ValidationError,
};
pub use knowledge::*;
pub use request::*;
