//! Tokenization: character-ratio estimates and prompt budgeting.

pub mod budget;
pub mod counter;

pub use budget::{
    select_modules_for_prompt, summary_placeholder, BudgetSelection, PromptBudget, SUMMARY_NOTE,
};
pub use counter::{char_budget, estimate_tokens};
