//! Rule validation and file loading.

use dbpulse_rules::rules::{validate_rules, RuleKind};
use dbpulse_rules::{load_rule_dir, load_rule_file, validate_and_load_rules, RuleStore};
use serde_json::{json, Value};

fn conn_entry() -> Value {
    json!({
        "metric_keywords": ["connection"],
        "data_conditions": [{"key": "total_connections", "exists": true}],
        "rules": [{
            "expression": "int(data['total_connections'])>90",
            "level": "critical",
            "score": 5,
            "reasoning": "High conn",
            "recommendations": ["scale up"]
        }]
    })
}

#[test]
fn test_rule_missing_reasoning_drops_whole_file_entry() {
    let mut entry = conn_entry();
    entry["rules"][0]
        .as_object_mut()
        .unwrap()
        .remove("reasoning");
    let raw = json!({"conn": entry});

    let report = validate_rules(&raw);
    assert_eq!(report.warning_count(), 1);
    assert!(validate_and_load_rules(&raw, "postgres.json").is_empty());
}

#[test]
fn test_valid_entries_returned_unchanged() {
    let raw = json!({
        "conn": conn_entry(),
        "disk": {"critical": {"threshold": 95.5, "reasoning": "{value}% used",
                              "recommendations": ["expand volume"], "extra": {"k": [1, 2]}}},
        "dropped": {"metric_keywords": "connection", "rules": []}
    });
    let accepted = validate_and_load_rules(&raw, "mixed.json");
    assert_eq!(accepted.len(), 2);
    assert_eq!(accepted["conn"], raw["conn"]);
    assert_eq!(accepted["disk"], raw["disk"]);
    assert_eq!(
        serde_json::to_string(&accepted["conn"]).unwrap(),
        serde_json::to_string(&raw["conn"]).unwrap()
    );
}

#[test]
fn test_unknown_fields_do_not_reject() {
    let mut entry = conn_entry();
    entry["description"] = json!("connection saturation");
    entry["rules"][0]["tags"] = json!(["pg"]);
    let accepted = validate_and_load_rules(&json!({"conn": entry.clone()}), "x");
    assert_eq!(accepted["conn"], entry);
}

#[test]
fn test_load_file_and_compile() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("postgres.json");
    std::fs::write(&path, serde_json::to_string_pretty(&json!({"conn": conn_entry()})).unwrap())
        .unwrap();

    let entries = load_rule_file(&path).unwrap();
    assert_eq!(entries.len(), 1);

    let store = RuleStore::load_file(&path).unwrap();
    let config = store.get("conn").unwrap();
    assert!(config.keywords.is_match("Connection_Usage"));
    assert!(matches!(config.kind, RuleKind::Expression { .. }));
}

#[test]
fn test_load_dir_skips_bad_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a_invalid.json"), "{\"oops\": ").unwrap();
    std::fs::write(
        dir.path().join("b_postgres.json"),
        json!({"conn": conn_entry()}).to_string(),
    )
    .unwrap();
    std::fs::write(dir.path().join("c_array.json"), "[1, 2, 3]").unwrap();

    let merged = load_rule_dir(dir.path()).unwrap();
    assert_eq!(merged.keys().collect::<Vec<_>>(), vec!["conn"]);

    let store = RuleStore::load_dir(dir.path()).unwrap();
    assert_eq!(store.len(), 1);
}

#[test]
fn test_empty_dir_gives_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = RuleStore::load_dir(dir.path()).unwrap();
    assert!(store.is_empty());
}
