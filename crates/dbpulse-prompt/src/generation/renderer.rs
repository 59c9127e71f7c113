//! Prompt rendering: run metadata, findings and issues into a template.

use chrono::{DateTime, SecondsFormat, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use dbpulse_core::errors::PromptError;
use dbpulse_core::Settings;
use dbpulse_rules::Issue;

use crate::templates::TemplateRegistry;

/// Facts about the run that the prompt quotes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub technology: String,
    pub db_version: String,
    pub target: String,
    pub timestamp: DateTime<Utc>,
}

impl RunMetadata {
    /// Metadata stamped with the current time.
    pub fn new(
        technology: impl Into<String>,
        db_version: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            technology: technology.into(),
            db_version: db_version.into(),
            target: target.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Renders prompts from a template registry.
#[derive(Debug, Clone, Default)]
pub struct PromptRenderer {
    registry: TemplateRegistry,
}

impl PromptRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: TemplateRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TemplateRegistry {
        &mut self.registry
    }

    /// Render with the template named by `settings.prompt_template`.
    pub fn render(
        &self,
        filtered_findings: &Value,
        settings: &Settings,
        critical_issues: &[Issue],
        high_issues: &[Issue],
        metadata: &RunMetadata,
    ) -> Result<String, PromptError> {
        let template = self.registry.resolve(settings.prompt_template());

        let mut vars: FxHashMap<&str, String> = FxHashMap::default();
        vars.insert("technology", metadata.technology.clone());
        vars.insert("db_version", metadata.db_version.clone());
        vars.insert("target", metadata.target.clone());
        vars.insert(
            "timestamp",
            metadata.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        vars.insert("findings", to_pretty_json(filtered_findings)?);
        vars.insert("critical_issues", to_pretty_json(critical_issues)?);
        vars.insert("high_issues", to_pretty_json(high_issues)?);
        vars.insert("critical_count", critical_issues.len().to_string());
        vars.insert("high_count", high_issues.len().to_string());

        Ok(template.render(&vars))
    }
}

/// Render with the built-in templates.
pub fn render_prompt(
    filtered_findings: &Value,
    settings: &Settings,
    critical_issues: &[Issue],
    high_issues: &[Issue],
    metadata: &RunMetadata,
) -> Result<String, PromptError> {
    PromptRenderer::new().render(
        filtered_findings,
        settings,
        critical_issues,
        high_issues,
        metadata,
    )
}

fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String, PromptError> {
    serde_json::to_string_pretty(value).map_err(|e| PromptError::Serialization(e.to_string()))
}
