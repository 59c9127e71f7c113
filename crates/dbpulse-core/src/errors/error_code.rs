//! ErrorCode trait for structured error reporting.

/// Every error enum implements this to provide a stable, machine-readable
/// code alongside its human-readable message.
pub trait ErrorCode {
    /// Returns the error code string (e.g., "RULE_LOAD_ERROR").
    fn error_code(&self) -> &'static str;

    /// Returns the formatted log string: `[ERROR_CODE] message`.
    fn coded_message(&self) -> String
    where
        Self: std::fmt::Display,
    {
        format!("[{}] {}", self.error_code(), self)
    }
}

pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
pub const RULE_LOAD_ERROR: &str = "RULE_LOAD_ERROR";
pub const RULE_COMPILE_ERROR: &str = "RULE_COMPILE_ERROR";
pub const EXPRESSION_SYNTAX: &str = "EXPRESSION_SYNTAX";
pub const EXPRESSION_EVAL: &str = "EXPRESSION_EVAL";
pub const TEMPLATE_ERROR: &str = "TEMPLATE_ERROR";
pub const PROMPT_ERROR: &str = "PROMPT_ERROR";
