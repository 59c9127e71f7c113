//! One-call prompt generation for a project directory.

use std::path::Path;

use serde_json::Value;

use dbpulse_core::constants::DEFAULT_RULES_DIR;
use dbpulse_core::errors::{ErrorCode, PipelineError};
use dbpulse_core::Settings;
use dbpulse_rules::RuleStore;

use super::generator::{GeneratedPrompt, PromptGenerator};
use super::renderer::RunMetadata;

/// Load settings from `root`, load the rule directory, then generate the prompt.
///
/// The rule directory is `rules_dir` from settings (relative paths resolve
/// against `root`), or `<root>/rules` when unset. A rule directory that
/// cannot be read is logged and the run continues with an empty rule store.
pub fn generate_for_project(
    root: &Path,
    settings_file: Option<&Path>,
    findings: &Value,
    metadata: &RunMetadata,
) -> Result<GeneratedPrompt, PipelineError> {
    let settings = Settings::load(root, settings_file)?;
    let rules_dir = match settings.rules_dir() {
        Some(dir) if dir.is_absolute() => dir,
        Some(dir) => root.join(dir),
        None => root.join(DEFAULT_RULES_DIR),
    };
    let store = match RuleStore::load_dir(&rules_dir) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("{}", e.coded_message());
            RuleStore::new()
        }
    };
    tracing::debug!(
        rules_dir = %rules_dir.display(),
        configs = store.len(),
        "rule store ready"
    );
    Ok(PromptGenerator::new(&store).generate(findings, &settings, metadata)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_rules_dir_runs_without_rules() {
        let dir = tempfile::tempdir().unwrap();
        let findings = json!({"connections": {"status": "success",
            "data": {"connection_stats": [{"total_connections": 95}]}}});
        let generated = generate_for_project(
            dir.path(),
            None,
            &findings,
            &RunMetadata::new("PostgreSQL", "16", "db1"),
        )
        .unwrap();
        assert_eq!(generated.classification.issue_count(), 0);
        assert_eq!(generated.included_modules, vec!["connections"]);
        assert!(generated.prompt.contains("total_connections"));
    }

    #[test]
    fn test_invalid_settings_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dbpulse.yaml"), "ai_max_prompt_tokens: -3\n").unwrap();
        let err = generate_for_project(
            dir.path(),
            None,
            &json!({}),
            &RunMetadata::new("PostgreSQL", "16", "db1"),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_relative_rules_dir_resolves_against_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("checks")).unwrap();
        std::fs::write(
            dir.path().join("checks/pg.json"),
            json!({"cache": {"metric_keywords": ["cache"],
                "rules": [{"expression": "data['hit_ratio'] < 0.9", "level": "high", "score": 4,
                           "reasoning": "hit ratio {hit_ratio}", "recommendations": ["raise shared_buffers"]}]}})
            .to_string(),
        )
        .unwrap();
        std::fs::write(dir.path().join("dbpulse.yaml"), "rules_dir: checks\n").unwrap();

        let findings = json!({"cache": {"status": "success", "data": {"cache_stats": [{"hit_ratio": 0.5}]}}});
        let generated = generate_for_project(
            dir.path(),
            None,
            &findings,
            &RunMetadata::new("PostgreSQL", "16", "db1"),
        )
        .unwrap();
        assert_eq!(generated.classification.high_issues.len(), 1);
        assert_eq!(generated.classification.high_issues[0].analysis.reasoning, "hit ratio 0.5");
    }
}
