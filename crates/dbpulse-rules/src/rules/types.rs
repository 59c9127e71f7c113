//! Core types for the rule store and severity analysis.

use std::fmt;
use std::str::FromStr;

use aho_corasick::AhoCorasick;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use smallvec::SmallVec;

use dbpulse_core::errors::ExpressionError;

use crate::expression::Expression;
use crate::template::ReasoningTemplate;

/// Severity levels a rule can assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Critical,
    High,
    Medium,
    Warning,
    Low,
    Info,
}

impl Level {
    /// All levels, most severe first. Threshold configs are checked in
    /// this order.
    pub const ALL: [Level; 6] = [
        Level::Critical,
        Level::High,
        Level::Medium,
        Level::Warning,
        Level::Low,
        Level::Info,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Warning => "warning",
            Self::Low => "low",
            Self::Info => "info",
        }
    }

    /// Weight used when a threshold config fires; expression rules carry
    /// their own score.
    pub fn default_score(&self) -> u32 {
        match self {
            Self::Critical => 5,
            Self::High => 4,
            Self::Medium => 3,
            Self::Warning => 2,
            Self::Low => 1,
            Self::Info => 0,
        }
    }

    /// Critical, high and medium results become issues.
    pub fn is_reportable(&self) -> bool {
        matches!(self, Self::Critical | Self::High | Self::Medium)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| format!("unknown level '{s}'"))
    }
}

/// Outcome of analyzing one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityAnalysis {
    pub level: Level,
    /// Opaque weight; never summed or compared across issues.
    pub score: Number,
    pub reasoning: String,
    pub recommendations: Vec<String>,
}

impl SeverityAnalysis {
    /// The result when no rule fires.
    pub fn neutral() -> Self {
        Self {
            level: Level::Info,
            score: Number::from(0u32),
            reasoning: String::new(),
            recommendations: Vec::new(),
        }
    }

    pub fn is_neutral(&self) -> bool {
        *self == Self::neutral()
    }
}

/// A reportable rule match against a specific row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub metric: String,
    pub analysis: SeverityAnalysis,
    pub data: Value,
}

/// Row-shape precondition: `key` must be present in the row. Only presence
/// is checked; the value and the `exists` flag are not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataCondition {
    pub key: String,
    pub exists: bool,
}

impl DataCondition {
    pub fn holds(&self, row: &Value) -> bool {
        row.get(&self.key).is_some()
    }
}

/// Which variables a rule's expression may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleScope {
    /// `data` and `settings`.
    Row,
    /// Additionally `all_structured_findings`, the whole findings tree.
    Global,
}

/// Case-insensitive substring matcher over a config's keywords.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keywords: Vec<String>,
    automaton: AhoCorasick,
}

impl KeywordMatcher {
    pub fn new(keywords: Vec<String>) -> Result<Self, String> {
        let lowered: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
        let automaton = AhoCorasick::new(&lowered).map_err(|e| e.to_string())?;
        Ok(Self {
            keywords,
            automaton,
        })
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn is_match(&self, metric: &str) -> bool {
        self.automaton.is_match(&metric.to_lowercase())
    }
}

/// One entry of an expression config's `rules` list.
#[derive(Debug, Clone)]
pub struct SeverityRule {
    pub source: String,
    /// Parse failures are kept; evaluating such a rule logs and reports
    /// no match.
    pub expression: Result<Expression, ExpressionError>,
    pub level: Level,
    pub score: Number,
    pub reasoning: ReasoningTemplate,
    pub recommendations: Vec<String>,
    pub scope: RuleScope,
}

/// One level of a threshold config.
#[derive(Debug, Clone)]
pub struct ThresholdLevel {
    pub level: Level,
    pub threshold: f64,
    pub reasoning: ReasoningTemplate,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum RuleKind {
    /// Keyword + precondition gated, expression evaluated.
    Expression {
        data_conditions: SmallVec<[DataCondition; 2]>,
        rules: Vec<SeverityRule>,
    },
    /// Compares the row's numeric `value` against per-level thresholds,
    /// most severe first.
    Threshold { levels: Vec<ThresholdLevel> },
}

/// A compiled rule configuration.
#[derive(Debug, Clone)]
pub struct RuleConfig {
    pub name: String,
    pub keywords: KeywordMatcher,
    pub kind: RuleKind,
}

impl RuleConfig {
    /// True when the metric name matches and every precondition holds.
    pub fn applies_to(&self, metric: &str, row: &Value) -> bool {
        if !self.keywords.is_match(metric) {
            return false;
        }
        match &self.kind {
            RuleKind::Expression {
                data_conditions, ..
            } => data_conditions.iter().all(|c| c.holds(row)),
            RuleKind::Threshold { .. } => true,
        }
    }

    pub fn is_global(&self) -> bool {
        match &self.kind {
            RuleKind::Expression { rules, .. } => {
                rules.iter().any(|r| r.scope == RuleScope::Global)
            }
            RuleKind::Threshold { .. } => false,
        }
    }
}
