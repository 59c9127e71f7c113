//! Severity analysis for a single row.

use serde_json::{Number, Value};
use tracing::{debug, warn};

use dbpulse_core::Settings;

use crate::expression::Scope;
use crate::rules::{
    RuleConfig, RuleKind, RuleScope, RuleStore, SeverityAnalysis, SeverityRule, ThresholdLevel,
};

/// Matches rows against a rule store, first match wins.
///
/// Candidate configs are tried in store order; within a config, rules are
/// tried in list order. A rule whose expression fails is logged and
/// treated as not matching, and the search moves on.
#[derive(Debug, Clone, Copy)]
pub struct SeverityAnalyzer<'r> {
    store: &'r RuleStore,
}

impl<'r> SeverityAnalyzer<'r> {
    pub fn new(store: &'r RuleStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &'r RuleStore {
        self.store
    }

    /// Classify `row` reported under `metric`. `all_findings` is only
    /// visible to global-scope rules.
    pub fn analyze(
        &self,
        metric: &str,
        row: &Value,
        settings: &Settings,
        all_findings: &Value,
    ) -> SeverityAnalysis {
        for config in self.store.candidates(metric, row) {
            if let Some(analysis) = evaluate_config(config, row, settings.as_json(), all_findings)
            {
                debug!(
                    metric,
                    config = %config.name,
                    level = %analysis.level,
                    "Rule matched"
                );
                return analysis;
            }
        }
        SeverityAnalysis::neutral()
    }
}

/// Analyze one row against `store`.
pub fn analyze_severity(
    store: &RuleStore,
    metric: &str,
    row: &Value,
    settings: &Settings,
    all_findings: &Value,
) -> SeverityAnalysis {
    SeverityAnalyzer::new(store).analyze(metric, row, settings, all_findings)
}

fn evaluate_config(
    config: &RuleConfig,
    row: &Value,
    settings: &Value,
    all_findings: &Value,
) -> Option<SeverityAnalysis> {
    match &config.kind {
        RuleKind::Expression { rules, .. } => rules
            .iter()
            .find_map(|rule| evaluate_rule(&config.name, rule, row, settings, all_findings)),
        RuleKind::Threshold { levels } => evaluate_thresholds(levels, row, settings),
    }
}

fn evaluate_rule(
    config: &str,
    rule: &SeverityRule,
    row: &Value,
    settings: &Value,
    all_findings: &Value,
) -> Option<SeverityAnalysis> {
    let expression = match &rule.expression {
        Ok(expression) => expression,
        Err(e) => {
            warn!(config, expression = %rule.source, error = %e, "Skipping rule with invalid expression");
            return None;
        }
    };

    let mut scope = Scope::new(row, settings);
    if rule.scope == RuleScope::Global {
        scope = scope.with_findings(all_findings);
    }

    match expression.evaluate_bool(&scope) {
        Ok(true) => Some(SeverityAnalysis {
            level: rule.level,
            score: rule.score.clone(),
            reasoning: rule.reasoning.render(&scope),
            recommendations: rule.recommendations.clone(),
        }),
        Ok(false) => None,
        Err(e) => {
            warn!(config, expression = %rule.source, error = %e, "Rule expression failed; treating as no match");
            None
        }
    }
}

/// Most severe level whose threshold the row's numeric `value` reaches.
fn evaluate_thresholds(
    levels: &[ThresholdLevel],
    row: &Value,
    settings: &Value,
) -> Option<SeverityAnalysis> {
    let value = row.get("value").and_then(Value::as_f64)?;
    let hit = levels.iter().find(|l| value >= l.threshold)?;
    let scope = Scope::new(row, settings);
    Some(SeverityAnalysis {
        level: hit.level,
        score: Number::from(hit.level.default_score()),
        reasoning: hit.reasoning.render(&scope),
        recommendations: hit.recommendations.clone(),
    })
}
