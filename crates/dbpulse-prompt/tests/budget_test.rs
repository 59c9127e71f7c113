//! Prompt budget selection.

use std::collections::BTreeMap;

use dbpulse_prompt::tokenization::{summary_placeholder, SUMMARY_NOTE};
use dbpulse_prompt::{select_modules_for_prompt, PromptBudget};
use dbpulse_rules::ModuleIssueTally;
use serde_json::json;

fn tally(critical: u32, high: u32) -> ModuleIssueTally {
    ModuleIssueTally {
        critical,
        high,
        medium: 0,
    }
}

#[test]
fn test_zero_budget_keeps_critical_module() {
    let findings = json!({
        "modA": {"status": "success", "data": {"rows": [{"total_connections": 95}]}},
        "modB": {"status": "success", "data": {"rows": [{"idle": 3}]}}
    });
    let mut tallies = BTreeMap::new();
    tallies.insert("modA".to_string(), tally(1, 0));
    tallies.insert("modB".to_string(), tally(0, 0));

    let out = select_modules_for_prompt(&findings, &tallies, 0);
    assert_eq!(out["modA"], findings["modA"]);
    assert_eq!(out["modB"], json!({"status": "success", "note": SUMMARY_NOTE}));
}

#[test]
fn test_high_only_module_is_pinned_over_budget() {
    let big = "x".repeat(10_000);
    let findings = json!({"mod": {"status": "success", "data": {"blob": big}}});
    let mut tallies = BTreeMap::new();
    tallies.insert("mod".to_string(), tally(0, 3));

    let selection = PromptBudget::new(10).select(&findings, &tallies);
    assert_eq!(selection.findings["mod"], findings["mod"]);
    assert!(selection.used_chars > selection.char_budget);
    assert!(selection.over_budget());
}

#[test]
fn test_pinned_size_counts_against_later_modules() {
    let findings = json!({
        "small": {"status": "success"},
        "pinned": {"status": "success", "data": {"blob": "y".repeat(200)}}
    });
    let mut tallies = BTreeMap::new();
    tallies.insert("pinned".to_string(), tally(1, 0));

    // Without the pinned module "small" would fit in 100 chars.
    let selection = PromptBudget::new(25).select(&findings, &tallies);
    assert_eq!(selection.summarized, vec!["small"]);
    assert_eq!(selection.findings["small"], summary_placeholder());
}

#[test]
fn test_large_budget_includes_everything() {
    let findings = json!({
        "a": {"status": "success", "data": {"x": [1, 2, 3]}},
        "b": {"status": "error", "error": "timeout"},
        "c": {"status": "skipped"}
    });
    let out = select_modules_for_prompt(&findings, &BTreeMap::new(), 8000);
    assert_eq!(out, findings);
}
