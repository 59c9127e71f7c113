//! Findings classification.

pub mod walker;

pub use walker::{classify_findings, Classification, FindingsWalker, ModuleIssueTally};
