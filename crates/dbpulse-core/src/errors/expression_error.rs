//! Rule expression errors.

use super::error_code::{self, ErrorCode};

/// Errors produced while parsing or evaluating a rule expression.
///
/// Evaluation failures are never fatal: the analyzer logs them and treats
/// the rule as not matching.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
    #[error("Syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("Unknown name '{0}'")]
    UnknownName(String),

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Index {index} out of range for sequence of length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("Type error: {0}")]
    Type(String),

    #[error("Invalid value: {0}")]
    Value(String),

    #[error("Division by zero")]
    DivisionByZero,
}

impl ErrorCode for ExpressionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => error_code::EXPRESSION_SYNTAX,
            _ => error_code::EXPRESSION_EVAL,
        }
    }
}
