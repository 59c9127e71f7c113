//! Output formats for the reporting layer.

pub mod markdown;

pub use markdown::MarkdownIssueFormatter;
