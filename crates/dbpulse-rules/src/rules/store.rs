//! The compiled, ordered rule store.

use std::path::Path;

use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use smallvec::SmallVec;
use tracing::{info, warn};

use dbpulse_core::errors::{ErrorCode, RuleError};

use crate::expression::Expression;
use crate::template::ReasoningTemplate;

use super::loader::{load_rule_dir, load_rule_file};
use super::types::{
    DataCondition, KeywordMatcher, Level, RuleConfig, RuleKind, RuleScope, SeverityRule,
    ThresholdLevel,
};
use super::validator::{is_expression_format, validate_and_load_rules};

/// Rule configurations in precedence order.
///
/// Lookup by name goes through an index; candidate scans walk the
/// configs in insertion order, which is the first-match-wins order.
#[derive(Debug, Clone, Default)]
pub struct RuleStore {
    configs: Vec<RuleConfig>,
    index: FxHashMap<String, usize>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile validated entries. An entry that cannot be compiled is
    /// logged and skipped.
    pub fn from_validated(entries: &Map<String, Value>) -> Self {
        let mut store = Self::new();
        for (name, raw) in entries {
            match compile_config(name, raw) {
                Ok(config) => store.insert(config),
                Err(e) => warn!("{}", e.coded_message()),
            }
        }
        info!(configs = store.len(), "Rule store compiled");
        store
    }

    /// Validate and compile an in-memory rule document.
    pub fn from_json(raw: &Value, source_label: &str) -> Self {
        Self::from_validated(&validate_and_load_rules(raw, source_label))
    }

    pub fn load_file(path: &Path) -> Result<Self, RuleError> {
        Ok(Self::from_validated(&load_rule_file(path)?))
    }

    pub fn load_dir(dir: &Path) -> Result<Self, RuleError> {
        Ok(Self::from_validated(&load_rule_dir(dir)?))
    }

    /// Add a config. A config with an existing name replaces it in place.
    pub fn insert(&mut self, config: RuleConfig) {
        match self.index.get(&config.name) {
            Some(&slot) => self.configs[slot] = config,
            None => {
                self.index.insert(config.name.clone(), self.configs.len());
                self.configs.push(config);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&RuleConfig> {
        self.index.get(name).map(|&i| &self.configs[i])
    }

    pub fn configs(&self) -> &[RuleConfig] {
        &self.configs
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.configs.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Configs whose keywords match `metric` and whose preconditions hold
    /// on `row`, in precedence order.
    pub fn candidates<'s>(
        &'s self,
        metric: &'s str,
        row: &'s Value,
    ) -> impl Iterator<Item = &'s RuleConfig> + 's {
        self.configs.iter().filter(move |c| c.applies_to(metric, row))
    }
}

fn compile_error(config: &str, message: impl Into<String>) -> RuleError {
    RuleError::Compile {
        config: config.to_string(),
        message: message.into(),
    }
}

fn compile_config(name: &str, raw: &Value) -> Result<RuleConfig, RuleError> {
    let entry = raw
        .as_object()
        .ok_or_else(|| compile_error(name, "entry is not an object"))?;

    if !is_expression_format(entry) {
        return compile_threshold(name, entry);
    }

    let keywords = string_list(name, entry.get("metric_keywords"))?;
    let keywords = KeywordMatcher::new(keywords).map_err(|e| compile_error(name, e))?;

    let data_conditions: SmallVec<[DataCondition; 2]> = match entry.get("data_conditions") {
        Some(conditions) => serde_json::from_value(conditions.clone())
            .map_err(|e| compile_error(name, e.to_string()))?,
        None => SmallVec::new(),
    };

    let rules = entry
        .get("rules")
        .and_then(Value::as_array)
        .ok_or_else(|| compile_error(name, "'rules' is not a list"))?
        .iter()
        .map(|rule| compile_rule(name, rule))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RuleConfig {
        name: name.to_string(),
        keywords,
        kind: RuleKind::Expression {
            data_conditions,
            rules,
        },
    })
}

fn compile_rule(config: &str, raw: &Value) -> Result<SeverityRule, RuleError> {
    let source = str_field(config, raw, "expression")?;
    let expression = Expression::parse(source);
    if let Err(e) = &expression {
        warn!(rule = config, expression = source, error = %e, "Rule expression does not parse");
    }

    let reasoning = ReasoningTemplate::parse_or_literal(str_field(config, raw, "reasoning")?, config);
    let scope = match &expression {
        Ok(expr) if expr.references_findings() || reasoning.references_findings() => {
            RuleScope::Global
        }
        _ => RuleScope::Row,
    };

    Ok(SeverityRule {
        source: source.to_string(),
        expression,
        level: level_field(config, raw)?,
        score: raw
            .get("score")
            .and_then(|s| match s {
                Value::Number(n) => Some(n.clone()),
                _ => None,
            })
            .ok_or_else(|| compile_error(config, "'score' is not a number"))?,
        reasoning,
        recommendations: string_list(config, raw.get("recommendations"))?,
        scope,
    })
}

fn compile_threshold(name: &str, entry: &Map<String, Value>) -> Result<RuleConfig, RuleError> {
    let mut levels = Vec::with_capacity(entry.len());
    for level in Level::ALL {
        let Some(spec) = entry.get(level.as_str()) else {
            continue;
        };
        levels.push(ThresholdLevel {
            level,
            threshold: spec
                .get("threshold")
                .and_then(Value::as_f64)
                .ok_or_else(|| compile_error(name, "'threshold' is not a number"))?,
            reasoning: ReasoningTemplate::parse_or_literal(str_field(name, spec, "reasoning")?, name),
            recommendations: string_list(name, spec.get("recommendations"))?,
        });
    }

    Ok(RuleConfig {
        name: name.to_string(),
        keywords: KeywordMatcher::new(vec![name.to_string()]).map_err(|e| compile_error(name, e))?,
        kind: RuleKind::Threshold { levels },
    })
}

fn str_field<'v>(config: &str, raw: &'v Value, field: &str) -> Result<&'v str, RuleError> {
    raw.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| compile_error(config, format!("'{field}' is not a string")))
}

fn level_field(config: &str, raw: &Value) -> Result<Level, RuleError> {
    str_field(config, raw, "level")?
        .parse()
        .map_err(|e: String| compile_error(config, e))
}

fn string_list(config: &str, raw: Option<&Value>) -> Result<Vec<String>, RuleError> {
    raw.and_then(Value::as_array)
        .ok_or_else(|| compile_error(config, "expected a list of strings"))?
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| compile_error(config, "expected a list of strings"))
        })
        .collect()
}
