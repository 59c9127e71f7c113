//! # dbpulse-rules
//!
//! Rule engine for database health findings: a restricted expression
//! language, reasoning templates, rule validation and loading, the
//! ordered rule store, severity analysis, and findings classification.

pub mod expression;
pub mod findings;
pub mod rules;
pub mod severity;
pub mod template;

pub use findings::{classify_findings, Classification, FindingsWalker, ModuleIssueTally};
pub use rules::{
    load_rule_dir, load_rule_file, validate_and_load_rules, Issue, Level, RuleStore,
    SeverityAnalysis,
};
pub use severity::{analyze_severity, SeverityAnalyzer};
