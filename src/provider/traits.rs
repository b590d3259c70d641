//! Provider trait definitions
//!
//! Defines the core LlmProvider trait that all providers must implement.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::provider::ProviderKind;
use crate::types::TokenUsage;

// ─────────────────────────────────────────────────────────────────
// Request / Response
// ─────────────────────────────────────────────────────────────────

/// A single text-generation request
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Model identifier on the provider (e.g. "llama3", "gpt-4o")
    pub model: String,

    /// The user prompt
    pub prompt: String,

    /// Optional system prompt
    pub system_prompt: Option<String>,

    /// Sampling temperature (0.0 = deterministic)
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: u32,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system_prompt: None,
            temperature: 0.7,
            max_tokens: 2048,
        }
    }

    pub fn with_system_prompt(mut self, system: impl Into<String>) -> Self {
        self.system_prompt = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// The provider's answer to a generation request
#[derive(Debug, Clone)]
pub struct GenerationResponse {
    /// The generated text
    pub text: String,

    /// Token usage as reported by the provider; None when the provider
    /// does not report usage (callers fall back to estimation)
    pub usage: Option<TokenUsage>,

    /// Wall-clock generation time in milliseconds
    pub generation_time_ms: u64,
}

impl GenerationResponse {
    /// Reported usage, or an estimate derived from the request and
    /// response text when the provider gave none.
    pub fn usage_or_estimate(&self, request: &GenerationRequest) -> TokenUsage {
        self.usage.unwrap_or_else(|| {
            let mut prompt_text = request.prompt.clone();
            if let Some(ref system) = request.system_prompt {
                prompt_text.push_str(system);
            }
            TokenUsage::estimated(&prompt_text, &self.text)
        })
    }
}

// ─────────────────────────────────────────────────────────────────
// LlmProvider Trait
// ─────────────────────────────────────────────────────────────────

/// Core trait for LLM providers
///
/// Implementations are stateless with respect to individual calls so a
/// single instance can serve concurrent pipeline stages. The trait is
/// object-safe for dynamic dispatch through the registry.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging (e.g. "local", "openai")
    fn name(&self) -> &'static str;

    /// Which registry slot this provider fills
    fn kind(&self) -> ProviderKind;

    /// Execute a text generation request
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse>;
}

/// Type alias for a shared provider reference
pub type SharedProvider = Arc<dyn LlmProvider>;

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = GenerationRequest::new("llama3", "Hello")
            .with_system_prompt("You are terse.")
            .with_temperature(0.0)
            .with_max_tokens(64);

        assert_eq!(request.model, "llama3");
        assert_eq!(request.prompt, "Hello");
        assert_eq!(request.system_prompt.as_deref(), Some("You are terse."));
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.max_tokens, 64);
    }

    #[test]
    fn test_usage_or_estimate_prefers_reported() {
        let request = GenerationRequest::new("llama3", "Hello");
        let response = GenerationResponse {
            text: "Hi".to_string(),
            usage: Some(TokenUsage::new(10, 5)),
            generation_time_ms: 1,
        };
        assert_eq!(response.usage_or_estimate(&request).total_tokens, 15);
    }

    #[test]
    fn test_usage_or_estimate_falls_back() {
        let request = GenerationRequest::new("llama3", "x".repeat(40));
        let response = GenerationResponse {
            text: "y".repeat(8),
            usage: None,
            generation_time_ms: 1,
        };
        let usage = response.usage_or_estimate(&request);
        assert_eq!(usage.prompt_tokens, 10);
        assert_eq!(usage.completion_tokens, 2);
    }
}
