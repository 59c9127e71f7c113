use dbpulse_core::Settings;
use dbpulse_rules::rules::validate_rules;
use dbpulse_rules::{analyze_severity, classify_findings, RuleStore};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

fn arb_key() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("metric_keywords".to_string()),
        Just("data_conditions".to_string()),
        Just("rules".to_string()),
        Just("expression".to_string()),
        Just("level".to_string()),
        Just("score".to_string()),
        Just("reasoning".to_string()),
        Just("recommendations".to_string()),
        Just("threshold".to_string()),
        Just("critical".to_string()),
        Just("key".to_string()),
        Just("exists".to_string()),
        "[a-z]{1,6}",
    ]
}

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        (-1.0e6f64..1.0e6).prop_map(|f| json!(f)),
        prop::sample::select(vec!["critical", "high", "info", "True", "data['x'] > 1", "{x}"])
            .prop_map(|s| Value::String(s.to_string())),
        "[a-z {}\\[\\]']{0,10}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..5).prop_map(Value::Array),
            prop::collection::vec((arb_key(), inner), 0..6)
                .prop_map(|pairs| Value::Object(pairs.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

fn arb_findings() -> impl Strategy<Value = Value> {
    let row = (0i64..200, any::<bool>()).prop_map(|(n, wrap)| {
        if wrap {
            json!({"total_connections": n, "state": "active"})
        } else {
            json!({"total_connections": n})
        }
    });
    let module = (
        prop::sample::select(vec!["success", "error", "skipped"]),
        prop::collection::vec(row, 0..5),
        any::<bool>(),
    )
        .prop_map(|(status, rows, wrapped)| {
            let rows = Value::Array(rows);
            let data = if wrapped { json!({"data": rows}) } else { rows };
            json!({"status": status, "data": {"connection_stats": data}})
        });
    prop::collection::vec(("[a-z]{1,8}", module), 0..6)
        .prop_map(|mods| Value::Object(mods.into_iter().collect::<Map<_, _>>()))
}

fn walker_store() -> RuleStore {
    RuleStore::from_json(
        &json!({"conn": {
            "metric_keywords": ["connection"],
            "data_conditions": [{"key": "total_connections", "exists": true}],
            "rules": [
                {"expression": "data['total_connections'] > 150", "level": "critical", "score": 5,
                 "reasoning": "{total_connections}", "recommendations": ["a"]},
                {"expression": "data['total_connections'] > 100", "level": "high", "score": 4,
                 "reasoning": "h", "recommendations": ["b"]},
                {"expression": "data['total_connections'] // 0 > 1", "level": "high", "score": 4,
                 "reasoning": "never", "recommendations": ["c"]},
                {"expression": "data['total_connections'] > 50", "level": "medium", "score": 3,
                 "reasoning": "m", "recommendations": ["d"]}
            ]
        }}),
        "inline",
    )
}

proptest! {
    #[test]
    fn validator_accepts_any_json(raw in arb_json()) {
        let report = validate_rules(&raw);
        for (name, entry) in &report.accepted {
            prop_assert_eq!(raw.get(name), Some(entry));
        }
        let store = RuleStore::from_validated(&report.accepted);
        prop_assert!(store.len() <= report.accepted.len());
    }

    #[test]
    fn first_rule_in_list_wins(v in -1000i64..1000, a in 0u32..10, b in 0u32..10) {
        let store = RuleStore::from_json(
            &json!({"c": {"metric_keywords": ["m"], "rules": [
                {"expression": format!("data['v'] >= {v}"), "level": "high", "score": a,
                 "reasoning": "first", "recommendations": ["x"]},
                {"expression": "True", "level": "critical", "score": b,
                 "reasoning": "second", "recommendations": ["y"]}
            ]}}),
            "inline",
        );
        let out = analyze_severity(&store, "m", &json!({"v": v}), &Settings::new(), &json!({}));
        prop_assert_eq!(out.reasoning, "first");
    }

    #[test]
    fn first_config_in_order_wins(names in prop::collection::btree_set("[a-z]{3,8}", 2..5)) {
        let mut doc = Map::new();
        for name in &names {
            doc.insert(name.clone(), json!({"metric_keywords": ["metric"], "rules": [
                {"expression": "True", "level": "medium", "score": 1,
                 "reasoning": name, "recommendations": ["x"]}]}));
        }
        let store = RuleStore::from_json(&Value::Object(doc), "inline");
        let out = analyze_severity(&store, "the_metric", &json!({}), &Settings::new(), &json!({}));
        let first = names.iter().next().cloned().unwrap_or_default();
        prop_assert_eq!(out.reasoning, first);
    }

    #[test]
    fn walker_is_idempotent(findings in arb_findings()) {
        let store = walker_store();
        let settings = Settings::new();
        let before = findings.clone();
        let first = classify_findings(&store, &findings, &settings);
        let second = classify_findings(&store, &findings, &settings);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(&findings, &before);
        prop_assert_eq!(first.per_module_tally.len(), findings.as_object().map_or(0, |m| m.len()));
    }
}
