use std::collections::BTreeMap;

use dbpulse_prompt::tokenization::summary_placeholder;
use dbpulse_prompt::PromptBudget;
use dbpulse_rules::ModuleIssueTally;
use proptest::prelude::*;
use serde_json::{json, Map, Value};

/// Findings with unique module names and a tally that pins some of them.
fn arb_case() -> impl Strategy<Value = (Value, BTreeMap<String, ModuleIssueTally>)> {
    let module = (0usize..300, 0u32..3, 0u32..3);
    prop::collection::btree_map("[a-z]{1,6}", module, 0..8).prop_map(|modules| {
        let mut findings = Map::new();
        let mut tally = BTreeMap::new();
        for (name, (pad, critical, high)) in modules {
            findings.insert(
                name.clone(),
                json!({"status": "success", "data": {"blob": "x".repeat(pad)}}),
            );
            tally.insert(
                name,
                ModuleIssueTally {
                    critical,
                    high,
                    medium: 0,
                },
            );
        }
        (Value::Object(findings), tally)
    })
}

proptest! {
    #[test]
    fn included_count_grows_with_budget(
        (findings, tally) in arb_case(),
        low in 0u64..400,
        extra in 0u64..400,
    ) {
        let small = PromptBudget::new(low).select(&findings, &tally);
        let large = PromptBudget::new(low + extra).select(&findings, &tally);
        prop_assert!(small.included.len() <= large.included.len());
    }

    #[test]
    fn critical_and_high_modules_always_verbatim(
        (findings, tally) in arb_case(),
        tokens in 0u64..200,
    ) {
        let selection = PromptBudget::new(tokens).select(&findings, &tally);
        for (name, t) in &tally {
            if t.critical > 0 || t.high > 0 {
                prop_assert_eq!(&selection.findings[name], &findings[name]);
            } else {
                let kept = &selection.findings[name];
                prop_assert!(kept == &findings[name] || kept == &summary_placeholder());
            }
        }
        let in_keys: Vec<&String> = findings.as_object().unwrap().keys().collect();
        let out_keys: Vec<&String> = selection.findings.as_object().unwrap().keys().collect();
        prop_assert_eq!(in_keys, out_keys);
    }
}
