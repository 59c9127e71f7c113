//! Findings walker over multi-module findings trees.

use dbpulse_core::Settings;
use dbpulse_rules::{classify_findings, Level, ModuleIssueTally, RuleStore};
use serde_json::{json, Value};

fn store() -> RuleStore {
    RuleStore::from_json(
        &json!({
            "conn": {
                "metric_keywords": ["connection"],
                "data_conditions": [{"key": "total_connections", "exists": true}],
                "rules": [
                    {"expression": "int(data['total_connections']) > 90", "level": "critical",
                     "score": 5, "reasoning": "{total_connections} connections",
                     "recommendations": ["scale up"]},
                    {"expression": "int(data['total_connections']) > 70", "level": "high",
                     "score": 4, "reasoning": "busy", "recommendations": ["pool"]}
                ]
            },
            "bloat": {
                "metric_keywords": ["bloat"],
                "rules": [{"expression": "data['bloat_pct'] > 30", "level": "medium",
                           "score": 3, "reasoning": "bloated", "recommendations": ["vacuum"]},
                          {"expression": "True", "level": "low",
                           "score": 1, "reasoning": "fine", "recommendations": ["none"]}]
            }
        }),
        "inline",
    )
}

fn findings() -> Value {
    json!({
        "modA": {"status": "error", "data": {}},
        "connections": {"status": "success", "data": {
            "connection_summary": [{"total_connections": 95}, {"total_connections": 75}]
        }},
        "tables": {"status": "success", "data": {
            "table_bloat": {"data": [{"bloat_pct": 45, "table": "orders"},
                                     {"bloat_pct": 5, "table": "users"}]},
            "note": "text only"
        }},
        "skipped": {"status": "skipped", "note": "not applicable"}
    })
}

#[test]
fn test_error_module_gets_zero_tally() {
    let out = classify_findings(&store(), &json!({"modA": {"status": "error", "data": {}}}), &Settings::new());
    assert_eq!(out.issue_count(), 0);
    assert_eq!(out.per_module_tally["modA"], ModuleIssueTally::default());
}

#[test]
fn test_buckets_and_tallies() {
    let out = classify_findings(&store(), &findings(), &Settings::new());

    assert_eq!(out.critical_issues.len(), 1);
    assert_eq!(out.high_issues.len(), 1);
    assert_eq!(out.medium_issues.len(), 1);

    let crit = &out.critical_issues[0];
    assert_eq!(crit.metric, "connections_connection_summary");
    assert_eq!(crit.analysis.reasoning, "95 connections");
    assert_eq!(crit.data, json!({"total_connections": 95}));

    assert_eq!(out.medium_issues[0].metric, "tables_table_bloat");
    assert_eq!(out.medium_issues[0].analysis.level, Level::Medium);

    assert_eq!(
        out.per_module_tally["connections"],
        ModuleIssueTally { critical: 1, high: 1, medium: 0 }
    );
    assert_eq!(
        out.per_module_tally["tables"],
        ModuleIssueTally { critical: 0, high: 0, medium: 1 }
    );
    assert_eq!(out.per_module_tally.len(), 4);
}

#[test]
fn test_issue_order_follows_findings_order() {
    let findings = json!({
        "z_first": {"status": "success", "data": {"connection_a": [{"total_connections": 99}]}},
        "a_second": {"status": "success", "data": {"connection_b": [{"total_connections": 98}]}}
    });
    let out = classify_findings(&store(), &findings, &Settings::new());
    let metrics: Vec<&str> = out.critical_issues.iter().map(|i| i.metric.as_str()).collect();
    assert_eq!(metrics, vec!["z_first_connection_a", "a_second_connection_b"]);
}

#[test]
fn test_classification_serializes_for_reporting() {
    let out = classify_findings(&store(), &findings(), &Settings::new());
    let value = serde_json::to_value(&out).unwrap();
    assert_eq!(value["critical_issues"][0]["analysis"]["level"], json!("critical"));
    assert_eq!(value["per_module_tally"]["modA"], json!({"critical": 0, "high": 0, "medium": 0}));
}
