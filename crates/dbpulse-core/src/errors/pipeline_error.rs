//! Errors for a full project run.

use super::error_code::ErrorCode;
use super::{ConfigError, PromptError, RuleError};

/// Errors that can occur across a prompt-generation run.
/// Aggregates subsystem errors via `From` conversions.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ErrorCode for PipelineError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Rule(e) => e.error_code(),
            Self::Prompt(e) => e.error_code(),
            Self::Config(e) => e.error_code(),
        }
    }
}
