//! Shared constants for the dbpulse rule engine.

/// Default AI prompt budget in tokens.
pub const DEFAULT_AI_MAX_PROMPT_TOKENS: u64 = 8000;

/// Characters per token used to turn a token budget into a character budget.
pub const CHARS_PER_TOKEN: u64 = 4;

/// Default prompt template name.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "default";

/// Environment variable holding the tracing filter.
pub const LOG_ENV_VAR: &str = "DBPULSE_LOG";

/// Project-level settings file names, tried in order.
pub const PROJECT_SETTINGS_FILES: &[&str] = &["dbpulse.yaml", "dbpulse.yml", "dbpulse.toml"];

/// Rule directory used when `rules_dir` is not configured, relative to the project root.
pub const DEFAULT_RULES_DIR: &str = "rules";
