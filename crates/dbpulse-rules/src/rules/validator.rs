//! Schema validation for raw rule JSON.
//!
//! Two entry shapes are accepted:
//! - expression format (has `metric_keywords` or `rules`):
//!   keywords, optional `data_conditions`, ordered `rules`;
//! - threshold format: `{ "<level>": {threshold, reasoning, recommendations} }`.
//!
//! Every violation becomes one warning string. An entry with any warning
//! is dropped whole; accepted entries are returned exactly as given.
//! Validation never fails.

use serde_json::{Map, Value};
use tracing::{info, warn};

use super::types::Level;

/// An entry dropped by validation, with every violation found.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedEntry {
    pub name: String,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    /// Accepted entries in input order, unchanged.
    pub accepted: Map<String, Value>,
    pub rejected: Vec<RejectedEntry>,
    /// Set when the document itself is not an object.
    pub root_issue: Option<String>,
}

impl ValidationReport {
    /// All warnings, one per violation, in input order.
    pub fn warnings(&self) -> Vec<String> {
        let mut out: Vec<String> = self.root_issue.iter().cloned().collect();
        for entry in &self.rejected {
            for issue in &entry.issues {
                out.push(format!("'{}': {}", entry.name, issue));
            }
        }
        out
    }

    pub fn warning_count(&self) -> usize {
        usize::from(self.root_issue.is_some())
            + self.rejected.iter().map(|e| e.issues.len()).sum::<usize>()
    }
}

/// Validate a parsed rule document and return the accepted entries.
///
/// Logs one warning per violation and one summary line.
pub fn validate_and_load_rules(raw: &Value, source_label: &str) -> Map<String, Value> {
    let report = validate_rules(raw);

    for warning in report.warnings() {
        warn!(source = source_label, "Invalid rule entry {warning}");
    }
    info!(
        source = source_label,
        accepted = report.accepted.len(),
        rejected = report.rejected.len(),
        warnings = report.warning_count(),
        "Rule validation complete"
    );

    report.accepted
}

/// Validate without logging.
pub fn validate_rules(raw: &Value) -> ValidationReport {
    let entries = match raw {
        Value::Object(entries) => entries,
        other => {
            return ValidationReport {
                root_issue: Some(format!(
                    "rule document must be an object, got {}",
                    kind(other)
                )),
                ..ValidationReport::default()
            }
        }
    };

    let mut report = ValidationReport::default();
    for (name, entry) in entries {
        let issues = validate_entry(entry);
        if issues.is_empty() {
            report.accepted.insert(name.clone(), entry.clone());
        } else {
            report.rejected.push(RejectedEntry {
                name: name.clone(),
                issues,
            });
        }
    }
    report
}

/// True when the entry uses the expression format.
pub fn is_expression_format(entry: &Map<String, Value>) -> bool {
    entry.contains_key("metric_keywords") || entry.contains_key("rules")
}

fn validate_entry(entry: &Value) -> Vec<String> {
    let mut issues = Vec::new();
    match entry {
        Value::Object(map) if is_expression_format(map) => {
            check_expression_entry(map, &mut issues)
        }
        Value::Object(map) => check_threshold_entry(map, &mut issues),
        other => issues.push(format!("entry must be an object, got {}", kind(other))),
    }
    issues
}

fn check_expression_entry(entry: &Map<String, Value>, issues: &mut Vec<String>) {
    check_string_list(entry, "metric_keywords", true, "", issues);

    match entry.get("data_conditions") {
        None => {}
        Some(Value::Array(conditions)) => {
            for (i, condition) in conditions.iter().enumerate() {
                let at = format!("data_conditions[{i}]");
                match condition {
                    Value::Object(c) => {
                        check_field(c, "key", Value::is_string, "a string", &at, issues);
                        check_field(c, "exists", Value::is_boolean, "a boolean", &at, issues);
                    }
                    other => issues.push(format!("'{at}' must be an object, got {}", kind(other))),
                }
            }
        }
        Some(other) => issues.push(format!(
            "'data_conditions' must be a list, got {}",
            kind(other)
        )),
    }

    match entry.get("rules") {
        None => issues.push("missing 'rules'".to_string()),
        Some(Value::Array(rules)) if rules.is_empty() => {
            issues.push("'rules' must not be empty".to_string())
        }
        Some(Value::Array(rules)) => {
            for (i, rule) in rules.iter().enumerate() {
                let at = format!("rules[{i}]");
                match rule {
                    Value::Object(r) => check_rule(r, &at, issues),
                    other => issues.push(format!("'{at}' must be an object, got {}", kind(other))),
                }
            }
        }
        Some(other) => issues.push(format!("'rules' must be a list, got {}", kind(other))),
    }
}

fn check_rule(rule: &Map<String, Value>, at: &str, issues: &mut Vec<String>) {
    check_field(rule, "expression", Value::is_string, "a string", at, issues);
    check_level(rule.get("level"), at, issues);
    check_field(rule, "score", Value::is_number, "a number", at, issues);
    check_field(rule, "reasoning", Value::is_string, "a string", at, issues);
    check_string_list(rule, "recommendations", true, at, issues);
}

fn check_threshold_entry(entry: &Map<String, Value>, issues: &mut Vec<String>) {
    if entry.is_empty() {
        issues.push("threshold entry must define at least one level".to_string());
        return;
    }
    for (level, spec) in entry {
        if level.parse::<Level>().is_err() {
            issues.push(format!("unknown level '{level}'"));
            continue;
        }
        match spec {
            Value::Object(s) => {
                check_field(s, "threshold", Value::is_number, "a number", level, issues);
                check_field(s, "reasoning", Value::is_string, "a string", level, issues);
                check_string_list(s, "recommendations", false, level, issues);
            }
            other => issues.push(format!("'{level}' must be an object, got {}", kind(other))),
        }
    }
}

fn field_path(at: &str, field: &str) -> String {
    if at.is_empty() {
        field.to_string()
    } else {
        format!("{at}.{field}")
    }
}

fn check_field(
    map: &Map<String, Value>,
    field: &str,
    predicate: fn(&Value) -> bool,
    expected: &str,
    at: &str,
    issues: &mut Vec<String>,
) {
    let path = field_path(at, field);
    match map.get(field) {
        None => issues.push(format!("missing '{path}'")),
        Some(v) if !predicate(v) => {
            issues.push(format!("'{path}' must be {expected}, got {}", kind(v)))
        }
        Some(_) => {}
    }
}

fn check_level(level: Option<&Value>, at: &str, issues: &mut Vec<String>) {
    let path = field_path(at, "level");
    match level {
        None => issues.push(format!("missing '{path}'")),
        Some(Value::String(s)) if s.parse::<Level>().is_ok() => {}
        Some(Value::String(s)) => issues.push(format!(
            "'{path}' must be one of critical, high, medium, low, info, warning; got '{s}'"
        )),
        Some(other) => issues.push(format!("'{path}' must be a string, got {}", kind(other))),
    }
}

fn check_string_list(
    map: &Map<String, Value>,
    field: &str,
    non_empty: bool,
    at: &str,
    issues: &mut Vec<String>,
) {
    let path = field_path(at, field);
    match map.get(field) {
        None => issues.push(format!("missing '{path}'")),
        Some(Value::Array(items)) => {
            if non_empty && items.is_empty() {
                issues.push(format!("'{path}' must not be empty"));
            }
            for (i, item) in items.iter().enumerate() {
                if !item.is_string() {
                    issues.push(format!("'{path}[{i}]' must be a string, got {}", kind(item)));
                }
            }
        }
        Some(other) => issues.push(format!("'{path}' must be a list, got {}", kind(other))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
