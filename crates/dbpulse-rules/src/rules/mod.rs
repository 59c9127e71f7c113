//! Rule store: validation, loading, and compiled rule configurations.

pub mod loader;
pub mod store;
pub mod types;
pub mod validator;

pub use loader::{load_rule_dir, load_rule_file};
pub use store::RuleStore;
pub use types::*;
pub use validator::{validate_and_load_rules, validate_rules, ValidationReport};
