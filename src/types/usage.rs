//! Token usage accounting

use serde::{Deserialize, Serialize};

/// Token usage statistics for a single provider call
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: u32,
    /// Number of tokens generated
    pub completion_tokens: u32,
    /// Total tokens (prompt + completion)
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt: u32, completion: u32) -> Self {
        Self {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
        }
    }

    /// Estimate usage from raw prompt/completion text when the provider
    /// does not report token counts.
    pub fn estimated(prompt_text: &str, completion_text: &str) -> Self {
        Self::new(estimate_tokens(prompt_text), estimate_tokens(completion_text))
    }
}

/// Rough token estimate: one token per four characters.
///
/// Used for judge-call accounting where exactness is not required.
pub fn estimate_tokens(text: &str) -> u32 {
    (text.chars().count() as u32).div_ceil(4)
}
