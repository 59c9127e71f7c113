//! Reasoning template errors.

use super::error_code::{self, ErrorCode};
use super::ExpressionError;

/// Errors produced while parsing a reasoning template.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TemplateError {
    #[error("Unclosed placeholder starting at offset {offset}")]
    UnclosedPlaceholder { offset: usize },

    #[error("Unmatched '}}' at offset {offset}")]
    UnmatchedBrace { offset: usize },

    #[error("Empty placeholder at offset {offset}")]
    EmptyPlaceholder { offset: usize },

    #[error("Unsupported format spec '{0}'")]
    UnsupportedFormat(String),

    #[error("Placeholder expression: {0}")]
    Expression(#[from] ExpressionError),
}

impl ErrorCode for TemplateError {
    fn error_code(&self) -> &'static str {
        error_code::TEMPLATE_ERROR
    }
}
