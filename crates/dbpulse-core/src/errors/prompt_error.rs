//! Prompt assembly errors.

use super::error_code::{self, ErrorCode};

/// Errors that can occur while assembling the AI prompt.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("Findings serialization failed: {0}")]
    Serialization(String),

    #[error("Prompt template '{name}' is empty")]
    EmptyTemplate { name: String },
}

impl ErrorCode for PromptError {
    fn error_code(&self) -> &'static str {
        error_code::PROMPT_ERROR
    }
}
