//! Error handling for dbpulse.
//! One error enum per subsystem, `thiserror` only, zero `anyhow`.

pub mod config_error;
pub mod error_code;
pub mod expression_error;
pub mod pipeline_error;
pub mod prompt_error;
pub mod rule_error;
pub mod template_error;

pub use config_error::ConfigError;
pub use error_code::ErrorCode;
pub use expression_error::ExpressionError;
pub use pipeline_error::PipelineError;
pub use prompt_error::PromptError;
pub use rule_error::RuleError;
pub use template_error::TemplateError;
