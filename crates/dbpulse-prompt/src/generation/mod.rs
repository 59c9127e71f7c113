//! Prompt generation: rendering and the end-to-end generator.

pub mod generator;
pub mod project;
pub mod renderer;

pub use generator::{GeneratedPrompt, PromptGenerator};
pub use project::generate_for_project;
pub use renderer::{render_prompt, PromptRenderer, RunMetadata};
