//! Walks a findings tree and classifies every row.
//!
//! Shapes visited, per module whose `status` is `"success"` and whose
//! `data` is an object:
//! - `data.<key containing "cloud_metrics">.<metric> = {value: <number>, ..}`
//!   analyzed as `AWS.<metric>`;
//! - `data.<key> = [rows]` or `data.<key> = {data: [rows]}`, each object
//!   row analyzed as `<module>_<key>`.
//!
//! Anything else is skipped silently.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use dbpulse_core::Settings;

use crate::rules::{Issue, Level, RuleStore};
use crate::severity::SeverityAnalyzer;

/// Critical/high/medium issue counts for one module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleIssueTally {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
}

impl ModuleIssueTally {
    pub fn record(&mut self, level: Level) {
        match level {
            Level::Critical => self.critical += 1,
            Level::High => self.high += 1,
            Level::Medium => self.medium += 1,
            _ => {}
        }
    }

    /// Modules with critical or high issues always go into the prompt.
    pub fn has_critical_or_high(&self) -> bool {
        self.critical > 0 || self.high > 0
    }

    pub fn total(&self) -> u32 {
        self.critical + self.high + self.medium
    }
}

/// Walker output: issues bucketed by level, in traversal order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub critical_issues: Vec<Issue>,
    pub high_issues: Vec<Issue>,
    pub medium_issues: Vec<Issue>,
    pub per_module_tally: BTreeMap<String, ModuleIssueTally>,
}

impl Classification {
    pub fn issue_count(&self) -> usize {
        self.critical_issues.len() + self.high_issues.len() + self.medium_issues.len()
    }

    fn push(&mut self, module: &str, issue: Issue) {
        let level = issue.analysis.level;
        let bucket = match level {
            Level::Critical => &mut self.critical_issues,
            Level::High => &mut self.high_issues,
            Level::Medium => &mut self.medium_issues,
            _ => return,
        };
        bucket.push(issue);
        self.per_module_tally
            .entry(module.to_string())
            .or_default()
            .record(level);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FindingsWalker<'r> {
    analyzer: SeverityAnalyzer<'r>,
}

impl<'r> FindingsWalker<'r> {
    pub fn new(store: &'r RuleStore) -> Self {
        Self {
            analyzer: SeverityAnalyzer::new(store),
        }
    }

    /// Classify every row in `findings`. Never mutates its input.
    pub fn classify(&self, findings: &Value, settings: &Settings) -> Classification {
        let mut out = Classification::default();
        let Some(modules) = findings.as_object() else {
            return out;
        };

        for (module, finding) in modules {
            out.per_module_tally.entry(module.clone()).or_default();

            if finding.get("status").and_then(Value::as_str) != Some("success") {
                continue;
            }
            let Some(data) = finding.get("data").and_then(Value::as_object) else {
                continue;
            };

            for (data_key, data_value) in data {
                match data_value {
                    Value::Object(metrics) if data_key.contains("cloud_metrics") => {
                        for (metric, entry) in metrics {
                            if entry.get("value").is_some_and(Value::is_number) {
                                let name = format!("AWS.{metric}");
                                self.visit(&mut out, module, &name, entry, settings, findings);
                            }
                        }
                    }
                    _ => {
                        let Some(rows) = rows_of(data_value) else {
                            continue;
                        };
                        let name = format!("{module}_{data_key}");
                        for row in rows.iter().filter(|r| r.is_object()) {
                            self.visit(&mut out, module, &name, row, settings, findings);
                        }
                    }
                }
            }
        }

        debug!(
            critical = out.critical_issues.len(),
            high = out.high_issues.len(),
            medium = out.medium_issues.len(),
            modules = out.per_module_tally.len(),
            "Findings classified"
        );
        out
    }

    fn visit(
        &self,
        out: &mut Classification,
        module: &str,
        metric: &str,
        row: &Value,
        settings: &Settings,
        findings: &Value,
    ) {
        let analysis = self.analyzer.analyze(metric, row, settings, findings);
        if analysis.level.is_reportable() {
            out.push(
                module,
                Issue {
                    metric: metric.to_string(),
                    analysis,
                    data: row.clone(),
                },
            );
        }
    }
}

/// `[rows]` or `{data: [rows]}`.
fn rows_of(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(rows) => Some(rows),
        Value::Object(map) => map.get("data").and_then(Value::as_array),
        _ => None,
    }
}

/// Classify `findings` against `store`.
pub fn classify_findings(store: &RuleStore, findings: &Value, settings: &Settings) -> Classification {
    FindingsWalker::new(store).classify(findings, settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> RuleStore {
        RuleStore::from_json(
            &json!({
                "conn": {
                    "metric_keywords": ["connection"],
                    "rules": [
                        {"expression": "data['n'] > 90", "level": "critical", "score": 5,
                         "reasoning": "very high", "recommendations": ["scale"]},
                        {"expression": "data['n'] > 50", "level": "medium", "score": 3,
                         "reasoning": "high", "recommendations": ["watch"]}
                    ]
                },
                "cpu": {
                    "metric_keywords": ["CPUUtilization"],
                    "rules": [{"expression": "data['value'] >= 80", "level": "high", "score": 4,
                               "reasoning": "cpu {value}", "recommendations": ["resize"]}]
                }
            }),
            "inline",
        )
    }

    #[test]
    fn test_rows_and_wrapped_rows() {
        let findings = json!({
            "pg": {"status": "success", "data": {
                "connection_stats": [{"n": 95}, {"n": 60}, {"n": 1}, "not a row"],
                "connection_pool": {"data": [{"n": 99}]}
            }}
        });
        let out = classify_findings(&store(), &findings, &Settings::new());
        assert_eq!(out.critical_issues.len(), 2);
        assert_eq!(out.medium_issues.len(), 1);
        assert_eq!(out.critical_issues[0].metric, "pg_connection_stats");
        assert_eq!(out.critical_issues[1].metric, "pg_connection_pool");
        assert_eq!(
            out.per_module_tally["pg"],
            ModuleIssueTally { critical: 2, high: 0, medium: 1 }
        );
    }

    #[test]
    fn test_cloud_metrics() {
        let findings = json!({
            "aws": {"status": "success", "data": {
                "prometheus_cloud_metrics": {
                    "CPUUtilization": {"value": 91.5, "unit": "%"},
                    "FreeStorage": {"value": "n/a"}
                }
            }}
        });
        let out = classify_findings(&store(), &findings, &Settings::new());
        assert_eq!(out.high_issues.len(), 1);
        assert_eq!(out.high_issues[0].metric, "AWS.CPUUtilization");
        assert_eq!(out.high_issues[0].analysis.reasoning, "cpu 91.5");
    }

    #[test]
    fn test_unsuccessful_and_malformed_modules_skipped() {
        let findings = json!({
            "failed": {"status": "error", "data": {"connection_x": [{"n": 99}]}},
            "no_data": {"status": "success", "data": [1, 2]},
            "junk": 7
        });
        let out = classify_findings(&store(), &findings, &Settings::new());
        assert_eq!(out.issue_count(), 0);
        assert_eq!(out.per_module_tally.len(), 3);
        assert!(out.per_module_tally.values().all(|t| t.total() == 0));
    }

    #[test]
    fn test_non_object_findings() {
        let out = classify_findings(&store(), &json!([1]), &Settings::new());
        assert_eq!(out, Classification::default());
    }
}
