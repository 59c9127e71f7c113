//! End-to-end prompt generation: classify, budget, render.

use serde_json::Value;
use tracing::info;

use dbpulse_core::errors::PromptError;
use dbpulse_core::Settings;
use dbpulse_rules::{Classification, FindingsWalker, RuleStore};

use super::renderer::{PromptRenderer, RunMetadata};
use crate::tokenization::{estimate_tokens, PromptBudget};

/// A rendered prompt and what went into it.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPrompt {
    pub prompt: String,
    /// Issue buckets for the report's issue section.
    pub classification: Classification,
    /// Modules included verbatim, in findings order.
    pub included_modules: Vec<String>,
    pub summarized_modules: Vec<String>,
    pub estimated_tokens: u64,
}

pub struct PromptGenerator<'r> {
    walker: FindingsWalker<'r>,
    renderer: PromptRenderer,
}

impl<'r> PromptGenerator<'r> {
    pub fn new(store: &'r RuleStore) -> Self {
        Self::with_renderer(store, PromptRenderer::new())
    }

    pub fn with_renderer(store: &'r RuleStore, renderer: PromptRenderer) -> Self {
        Self {
            walker: FindingsWalker::new(store),
            renderer,
        }
    }

    pub fn renderer_mut(&mut self) -> &mut PromptRenderer {
        &mut self.renderer
    }

    pub fn generate(
        &self,
        findings: &Value,
        settings: &Settings,
        metadata: &RunMetadata,
    ) -> Result<GeneratedPrompt, PromptError> {
        let classification = self.walker.classify(findings, settings);
        let selection =
            PromptBudget::from_settings(settings).select(findings, &classification.per_module_tally);

        let prompt = self.renderer.render(
            &selection.findings,
            settings,
            &classification.critical_issues,
            &classification.high_issues,
            metadata,
        )?;
        let estimated_tokens = estimate_tokens(&prompt);

        info!(
            target_name = %metadata.target,
            critical = classification.critical_issues.len(),
            high = classification.high_issues.len(),
            medium = classification.medium_issues.len(),
            summarized = selection.summarized.len(),
            estimated_tokens,
            "Prompt generated"
        );

        Ok(GeneratedPrompt {
            prompt,
            included_modules: selection.verbatim_modules(),
            summarized_modules: selection.summarized,
            classification,
            estimated_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> RuleStore {
        RuleStore::from_json(
            &json!({"conn": {
                "metric_keywords": ["connection"],
                "rules": [{"expression": "data['n'] > 90", "level": "critical", "score": 5,
                           "reasoning": "{n} connections", "recommendations": ["scale up"]}]
            }}),
            "inline",
        )
    }

    #[test]
    fn test_generate_pins_problem_modules() {
        let findings = json!({
            "quiet": {"status": "success", "data": {"disk": [{"pct": 10}]}},
            "connections": {"status": "success", "data": {"connection_stats": [{"n": 95}]}}
        });
        let mut settings = Settings::new();
        settings.set("ai_max_prompt_tokens", json!(0));

        let store = store();
        let generated = PromptGenerator::new(&store)
            .generate(&findings, &settings, &RunMetadata::new("PostgreSQL", "16", "db1"))
            .unwrap();

        assert_eq!(generated.classification.critical_issues.len(), 1);
        assert_eq!(generated.included_modules, vec!["connections"]);
        assert_eq!(generated.summarized_modules, vec!["quiet"]);
        assert!(generated.prompt.contains("95 connections"));
        assert!(generated.prompt.contains("summarized due to prompt size limits"));
        assert_eq!(generated.estimated_tokens, estimate_tokens(&generated.prompt));
    }
}
