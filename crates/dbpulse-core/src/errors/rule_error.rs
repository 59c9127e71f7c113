//! Rule file loading and compilation errors.

use super::error_code::{self, ErrorCode};

/// Errors raised while reading rule files or compiling validated entries.
///
/// Schema violations are not errors: the validator drops the offending
/// entry and logs a warning instead.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("Cannot read rule file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid JSON in rule file {path}: {message}")]
    InvalidJson { path: String, message: String },

    #[error("Invalid rule file pattern {pattern}: {message}")]
    Pattern { pattern: String, message: String },

    #[error("Rule config {config} could not be compiled: {message}")]
    Compile { config: String, message: String },
}

impl ErrorCode for RuleError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Compile { .. } => error_code::RULE_COMPILE_ERROR,
            _ => error_code::RULE_LOAD_ERROR,
        }
    }
}
