//! Character-ratio token estimation.

use dbpulse_core::constants::CHARS_PER_TOKEN;

/// Characters allowed for a token budget.
pub fn char_budget(max_tokens: u64) -> u64 {
    max_tokens.saturating_mul(CHARS_PER_TOKEN)
}

/// Estimated token count of `text`, rounded up.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.len() as u64).div_ceil(CHARS_PER_TOKEN)
}
