//! # dbpulse-prompt
//!
//! Prompt assembly for AI recommendations on health-check findings.
//! Provides token budgeting, prompt templates and rendering, the
//! markdown issue section, and the end-to-end prompt generator.

pub mod formats;
pub mod generation;
pub mod templates;
pub mod tokenization;

pub use formats::MarkdownIssueFormatter;
pub use generation::{
    generate_for_project, render_prompt, GeneratedPrompt, PromptGenerator, PromptRenderer,
    RunMetadata,
};
pub use templates::{PromptTemplate, TemplateRegistry};
pub use tokenization::{select_modules_for_prompt, BudgetSelection, PromptBudget};
