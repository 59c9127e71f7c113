//! Prompt templates and their registry.
//!
//! Templates are plain text with `{{name}}` placeholders. Substitution is
//! a single left-to-right pass, so substituted values are never scanned
//! again; unknown placeholders stay as written.

use rustc_hash::FxHashMap;
use tracing::warn;

use dbpulse_core::constants::DEFAULT_PROMPT_TEMPLATE;
use dbpulse_core::errors::PromptError;

pub const CONCISE_PROMPT_TEMPLATE: &str = "concise";

const DEFAULT_BODY: &str = include_str!("builtin/default.txt");
const CONCISE_BODY: &str = include_str!("builtin/concise.txt");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    name: String,
    body: String,
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Result<Self, PromptError> {
        let name = name.into();
        let body = body.into();
        if body.trim().is_empty() {
            return Err(PromptError::EmptyTemplate { name });
        }
        Ok(Self { name, body })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Placeholder names in order of appearance, duplicates included.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut rest = self.body.as_str();
        while let Some(open) = rest.find("{{") {
            let after = &rest[open + 2..];
            match after.find("}}") {
                Some(close) => {
                    names.push(after[..close].trim());
                    rest = &after[close + 2..];
                }
                None => break,
            }
        }
        names
    }

    /// Substitute `{{name}}` placeholders from `vars`.
    pub fn render(&self, vars: &FxHashMap<&str, String>) -> String {
        let mut out = String::with_capacity(self.body.len());
        let mut rest = self.body.as_str();

        while let Some(open) = rest.find("{{") {
            out.push_str(&rest[..open]);
            let after = &rest[open + 2..];
            let Some(close) = after.find("}}") else {
                out.push_str(&rest[open..]);
                return out;
            };
            let key = after[..close].trim();
            match vars.get(key) {
                Some(value) => out.push_str(value),
                None => out.push_str(&rest[open..open + 2 + close + 2]),
            }
            rest = &after[close + 2..];
        }
        out.push_str(rest);
        out
    }
}

/// Named prompt templates. Always holds a `default` template.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    default: PromptTemplate,
    others: FxHashMap<String, PromptTemplate>,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        let mut others = FxHashMap::default();
        others.insert(
            CONCISE_PROMPT_TEMPLATE.to_string(),
            PromptTemplate {
                name: CONCISE_PROMPT_TEMPLATE.to_string(),
                body: CONCISE_BODY.to_string(),
            },
        );
        Self {
            default: PromptTemplate {
                name: DEFAULT_PROMPT_TEMPLATE.to_string(),
                body: DEFAULT_BODY.to_string(),
            },
            others,
        }
    }
}

impl TemplateRegistry {
    /// Registry with the built-in `default` and `concise` templates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a template. Registering `default` replaces the
    /// fallback.
    pub fn register(&mut self, name: &str, body: &str) -> Result<(), PromptError> {
        let template = PromptTemplate::new(name, body)?;
        if name == DEFAULT_PROMPT_TEMPLATE {
            self.default = template;
        } else {
            self.others.insert(name.to_string(), template);
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&PromptTemplate> {
        if name == DEFAULT_PROMPT_TEMPLATE {
            Some(&self.default)
        } else {
            self.others.get(name)
        }
    }

    /// The named template, or `default` with a warning.
    pub fn resolve(&self, name: &str) -> &PromptTemplate {
        self.get(name).unwrap_or_else(|| {
            warn!(template = name, "Unknown prompt template; using default");
            &self.default
        })
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = std::iter::once(self.default.name())
            .chain(self.others.keys().map(String::as_str))
            .collect();
        names.sort_unstable();
        names
    }
}
