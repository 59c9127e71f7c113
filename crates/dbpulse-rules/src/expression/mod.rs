//! Restricted expression language for rule conditions and templates.
//!
//! A small, side-effect-free subset of Python expression syntax:
//! literals, `data[...]`/`settings[...]` access, arithmetic, chained
//! comparisons, `and`/`or`/`not`, conditional expressions, list and
//! generator comprehensions, a whitelist of built-in functions
//! (`int float str bool len sum min max abs round any all`), and a few
//! string/dict methods. There is no assignment, no attribute access
//! other than method calls, and no way to reach the host.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value;

use serde_json::Value;

use dbpulse_core::errors::ExpressionError;

pub use eval::Scope;

/// The current row.
pub const DATA_VAR: &str = "data";
/// The effective settings object.
pub const SETTINGS_VAR: &str = "settings";
/// The whole findings tree; only bound for global rules.
pub const FINDINGS_VAR: &str = "all_structured_findings";

/// A parsed expression together with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    ast: ast::Expr,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        Ok(Self {
            source: source.to_string(),
            ast: parser::parse(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &ast::Expr {
        &self.ast
    }

    /// True when the expression reads `all_structured_findings`.
    pub fn references_findings(&self) -> bool {
        self.ast.references(FINDINGS_VAR)
    }

    pub fn evaluate(&self, scope: &Scope<'_>) -> Result<Value, ExpressionError> {
        eval::evaluate(&self.ast, scope).map(|v| v.into_owned())
    }

    /// Evaluate and apply truthiness.
    pub fn evaluate_bool(&self, scope: &Scope<'_>) -> Result<bool, ExpressionError> {
        eval::evaluate(&self.ast, scope).map(|v| value::is_truthy(&v))
    }
}
