//! The run settings bag with layered resolution.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::constants::{
    DEFAULT_AI_MAX_PROMPT_TOKENS, DEFAULT_PROMPT_TEMPLATE, PROJECT_SETTINGS_FILES,
};
use crate::errors::ConfigError;

/// Arbitrary key-value run configuration.
///
/// Rule expressions read it through the `settings` variable, so it stays an
/// untyped JSON object. A handful of typed accessors cover the keys the
/// engine itself consumes.
///
/// Resolution order (highest priority first):
/// 1. Environment variables (`DBPULSE_*`)
/// 2. Explicit settings file
/// 3. Project settings file (`dbpulse.yaml`, `dbpulse.yml` or `dbpulse.toml` in the root)
/// 4. Compiled defaults (empty bag; accessors supply defaults)
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    values: Value,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            values: Value::Object(Map::new()),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an in-memory JSON object.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(_) => Ok(Self { values: value }),
            Value::Null => Ok(Self::default()),
            other => Err(ConfigError::ValidationFailed {
                field: "<root>".to_string(),
                message: format!("settings must be a mapping, got {}", json_kind(&other)),
            }),
        }
    }

    /// Parse settings from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })?;
        Self::from_value(value)
    }

    /// Parse settings from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let value: Value = toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })?;
        Self::from_value(value)
    }

    /// Read a settings file, choosing the format by extension.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let parsed = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            Some("toml") => Self::from_toml_str(&content),
            _ => {
                return Err(ConfigError::UnsupportedFormat {
                    path: path.display().to_string(),
                })
            }
        };

        parsed.map_err(|e| match e {
            ConfigError::ParseError { message, .. } => ConfigError::ParseError {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    /// Load settings with layered resolution.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        // Project file: first existing candidate wins.
        if let Some(project) = PROJECT_SETTINGS_FILES
            .iter()
            .map(|name| root.join(name))
            .find(|p| p.exists())
        {
            let file_settings = Self::from_file(&project)?;
            settings.merge(&file_settings);
            tracing::debug!(path = %project.display(), "merged project settings");
        }

        if let Some(path) = explicit {
            let file_settings = Self::from_file(path)?;
            settings.merge(&file_settings);
            tracing::debug!(path = %path.display(), "merged explicit settings");
        }

        settings.apply_env_overrides();
        settings.validate()?;

        Ok(settings)
    }

    /// The whole bag, as handed to rule expressions.
    pub fn as_json(&self) -> &Value {
        &self.values
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        if let Value::Object(map) = &mut self.values {
            map.insert(key.into(), value);
        }
    }

    /// Prompt budget in tokens. Default: 8000.
    pub fn ai_max_prompt_tokens(&self) -> u64 {
        self.get("ai_max_prompt_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_AI_MAX_PROMPT_TOKENS)
    }

    /// Name of the prompt template to render. Default: `"default"`.
    pub fn prompt_template(&self) -> &str {
        self.get("prompt_template")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_PROMPT_TEMPLATE)
    }

    /// Directory holding the per-technology rule files, if configured.
    pub fn rules_dir(&self) -> Option<PathBuf> {
        self.get("rules_dir").and_then(Value::as_str).map(PathBuf::from)
    }

    /// Target technology (e.g. `"postgres"`), if configured.
    pub fn technology(&self) -> Option<&str> {
        self.get("technology").and_then(Value::as_str)
    }

    /// Validate the values the engine consumes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(tokens) = self.get("ai_max_prompt_tokens") {
            if tokens.as_u64().is_none() {
                return Err(ConfigError::ValidationFailed {
                    field: "ai_max_prompt_tokens".to_string(),
                    message: "must be a non-negative integer".to_string(),
                });
            }
        }
        if let Some(template) = self.get("prompt_template") {
            if !template.is_string() {
                return Err(ConfigError::ValidationFailed {
                    field: "prompt_template".to_string(),
                    message: "must be a string".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Merge `other` into `self`. Nested mappings merge key by key; any
    /// other value in `other` replaces the existing one.
    pub fn merge(&mut self, other: &Settings) {
        merge_values(&mut self.values, &other.values);
    }

    /// Apply environment variable overrides.
    /// Pattern: `DBPULSE_AI_MAX_PROMPT_TOKENS`, `DBPULSE_PROMPT_TEMPLATE`, `DBPULSE_RULES_DIR`.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DBPULSE_AI_MAX_PROMPT_TOKENS") {
            match val.parse::<u64>() {
                Ok(v) => self.set("ai_max_prompt_tokens", Value::from(v)),
                Err(_) => tracing::warn!(value = %val, "ignoring non-numeric DBPULSE_AI_MAX_PROMPT_TOKENS"),
            }
        }
        if let Ok(val) = std::env::var("DBPULSE_PROMPT_TEMPLATE") {
            self.set("prompt_template", Value::String(val));
        }
        if let Ok(val) = std::env::var("DBPULSE_RULES_DIR") {
            self.set("rules_dir", Value::String(val));
        }
    }
}

fn merge_values(base: &mut Value, other: &Value) {
    match (base, other) {
        (Value::Object(base_map), Value::Object(other_map)) => {
            for (key, value) in other_map {
                match base_map.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_values(existing, value);
                    }
                    _ => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, other) => *base = other.clone(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
