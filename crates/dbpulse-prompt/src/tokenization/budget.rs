//! Prompt budget: which modules go into the prompt verbatim.
//!
//! Two passes over the findings object:
//! 1. modules with critical or high issues are always included and count
//!    toward the running size, even past the budget;
//! 2. the rest, in findings order, are included while
//!    `running + size < budget`. The first module that does not fit and
//!    every module after it are replaced by a summary placeholder.
//!
//! Stopping at the first misfit, rather than skipping it and trying smaller
//! modules later, keeps the included set monotone in the budget.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use serde_json::{json, Map, Value};
use tracing::debug;

use dbpulse_core::Settings;
use dbpulse_rules::ModuleIssueTally;

use super::counter::char_budget;

/// Note carried by the placeholder of a summarized module.
pub const SUMMARY_NOTE: &str = "summarized due to prompt size limits, no critical/high issues";

/// Stand-in for a module left out of the prompt.
pub fn summary_placeholder() -> Value {
    json!({"status": "success", "note": SUMMARY_NOTE})
}

/// Outcome of budgeting one findings object.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetSelection {
    /// Findings with summarized modules replaced, in the original order.
    pub findings: Value,
    /// Included because of critical or high issues.
    pub pinned: Vec<String>,
    /// Included because they fit.
    pub included: Vec<String>,
    pub summarized: Vec<String>,
    /// Serialized size of everything included verbatim.
    pub used_chars: u64,
    pub char_budget: u64,
}

impl BudgetSelection {
    /// Every module included verbatim, in findings order.
    pub fn verbatim_modules(&self) -> Vec<String> {
        self.findings
            .as_object()
            .map(|modules| {
                let summarized: FxHashSet<&str> =
                    self.summarized.iter().map(String::as_str).collect();
                modules
                    .keys()
                    .filter(|name| !summarized.contains(name.as_str()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn over_budget(&self) -> bool {
        self.used_chars >= self.char_budget && !self.pinned.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptBudget {
    max_tokens: u64,
}

impl PromptBudget {
    pub fn new(max_tokens: u64) -> Self {
        Self { max_tokens }
    }

    /// Budget from `ai_max_prompt_tokens`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.ai_max_prompt_tokens())
    }

    pub fn max_tokens(&self) -> u64 {
        self.max_tokens
    }

    pub fn char_budget(&self) -> u64 {
        char_budget(self.max_tokens)
    }

    pub fn select(
        &self,
        findings: &Value,
        tally: &BTreeMap<String, ModuleIssueTally>,
    ) -> BudgetSelection {
        let budget = self.char_budget();
        let mut selection = BudgetSelection {
            findings: Value::Object(Map::new()),
            pinned: Vec::new(),
            included: Vec::new(),
            summarized: Vec::new(),
            used_chars: 0,
            char_budget: budget,
        };
        let Some(modules) = findings.as_object() else {
            return selection;
        };

        let is_pinned =
            |name: &str| tally.get(name).is_some_and(ModuleIssueTally::has_critical_or_high);

        for (name, module) in modules {
            if is_pinned(name) {
                selection.used_chars = selection.used_chars.saturating_add(serialized_len(module));
                selection.pinned.push(name.clone());
            }
        }

        let mut exhausted = false;
        let mut summarized: FxHashSet<&str> = FxHashSet::default();
        for (name, module) in modules {
            if is_pinned(name) {
                continue;
            }
            let size = serialized_len(module);
            if !exhausted && selection.used_chars.saturating_add(size) < budget {
                selection.used_chars += size;
                selection.included.push(name.clone());
            } else {
                exhausted = true;
                summarized.insert(name.as_str());
                selection.summarized.push(name.clone());
            }
        }

        let mut out = Map::with_capacity(modules.len());
        for (name, module) in modules {
            let value = if summarized.contains(name.as_str()) {
                summary_placeholder()
            } else {
                module.clone()
            };
            out.insert(name.clone(), value);
        }
        selection.findings = Value::Object(out);

        debug!(
            budget_chars = budget,
            used_chars = selection.used_chars,
            pinned = selection.pinned.len(),
            included = selection.included.len(),
            summarized = selection.summarized.len(),
            "Prompt budget applied"
        );
        selection
    }
}

/// Filtered findings for a token budget.
pub fn select_modules_for_prompt(
    findings: &Value,
    tally: &BTreeMap<String, ModuleIssueTally>,
    max_prompt_tokens: u64,
) -> Value {
    PromptBudget::new(max_prompt_tokens)
        .select(findings, tally)
        .findings
}

/// Compact JSON length of a module, the unit the budget is measured in.
fn serialized_len(module: &Value) -> u64 {
    serde_json::to_string(module).map_or(0, |s| s.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tally(entries: &[(&str, u32, u32)]) -> BTreeMap<String, ModuleIssueTally> {
        entries
            .iter()
            .map(|(name, critical, high)| {
                (
                    name.to_string(),
                    ModuleIssueTally {
                        critical: *critical,
                        high: *high,
                        medium: 0,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_zero_budget_keeps_only_pinned() {
        let findings = json!({
            "modA": {"status": "success", "data": {"x": [1, 2, 3]}},
            "modB": {"status": "success", "data": {"y": []}}
        });
        let selection =
            PromptBudget::new(0).select(&findings, &tally(&[("modA", 1, 0), ("modB", 0, 0)]));
        assert_eq!(selection.findings["modA"], findings["modA"]);
        assert_eq!(selection.findings["modB"], summary_placeholder());
        assert_eq!(selection.pinned, vec!["modA"]);
        assert_eq!(selection.summarized, vec!["modB"]);
        assert!(selection.over_budget());
    }

    #[test]
    fn test_stops_at_first_module_that_does_not_fit() {
        let findings = json!({
            "small": {"status": "success"},
            "huge": {"status": "success", "data": {"blob": "x".repeat(400)}},
            "tiny": {"s": 1}
        });
        // 25 tokens = 100 chars: "small" fits, "huge" does not.
        let selection = PromptBudget::new(25).select(&findings, &BTreeMap::new());
        assert_eq!(selection.included, vec!["small"]);
        assert_eq!(selection.summarized, vec!["huge", "tiny"]);
    }

    #[test]
    fn test_strict_comparison() {
        let module = json!({"k": "v"});
        let size = serde_json::to_string(&module).unwrap().len() as u64;
        assert_eq!(size, 9);
        let findings = json!({"m": module});
        // 12 chars budget > 9: fits.
        assert_eq!(PromptBudget::new(3).select(&findings, &BTreeMap::new()).included, vec!["m"]);
        // 8 chars: does not.
        assert!(PromptBudget::new(2).select(&findings, &BTreeMap::new()).included.is_empty());
    }

    #[test]
    fn test_module_order_preserved() {
        let findings = json!({"c": {"a": 1}, "a": {"big": "y".repeat(100)}, "b": {"b": 2}});
        let out = select_modules_for_prompt(&findings, &tally(&[("b", 0, 2)]), 5);
        let keys: Vec<&String> = out.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
        assert_eq!(out["a"], summary_placeholder());
        assert_eq!(out["b"], findings["b"]);
    }

    #[test]
    fn test_many_modules_partition_into_verbatim_and_summarized() {
        let mut modules = Map::new();
        for i in 0..5_000 {
            modules.insert(format!("m{i:04}"), json!({"status": "success", "data": {"i": i}}));
        }
        let findings = Value::Object(modules);
        let selection = PromptBudget::new(5_000).select(&findings, &tally(&[("m4999", 1, 0)]));

        let verbatim = selection.verbatim_modules();
        assert_eq!(verbatim.len() + selection.summarized.len(), 5_000);
        assert_eq!(verbatim.last().map(String::as_str), Some("m4999"));
        assert!(!selection.summarized.is_empty());
        for name in &selection.summarized {
            assert_eq!(selection.findings[name], summary_placeholder());
        }
        for name in &verbatim {
            assert_eq!(selection.findings[name], findings[name]);
        }
    }

    #[test]
    fn test_non_object_findings() {
        let selection = PromptBudget::new(100).select(&json!(null), &BTreeMap::new());
        assert_eq!(selection.findings, json!({}));
    }
}
