//! Severity analysis.

pub mod analyzer;

pub use analyzer::{analyze_severity, SeverityAnalyzer};
