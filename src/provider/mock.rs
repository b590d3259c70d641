//! Mock provider for testing
//!
//! Plays back a scripted sequence of responses and failures, and records
//! every request it receives so tests can assert on models, prompts and
//! temperatures.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::provider::{GenerationRequest, GenerationResponse, LlmProvider, ProviderKind};
use crate::types::TokenUsage;

// ─────────────────────────────────────────────────────────────────
// Script
// ─────────────────────────────────────────────────────────────────

/// One scripted step of mock behavior
#[derive(Debug, Clone)]
pub enum MockScript {
    /// Return this text (with optional reported usage)
    Respond {
        text: String,
        usage: Option<TokenUsage>,
    },
    /// Fail with a provider-unavailable error
    Fail { message: String },
}

// ─────────────────────────────────────────────────────────────────
// Mock Provider
// ─────────────────────────────────────────────────────────────────

/// Scriptable mock implementation of LlmProvider
pub struct MockProvider {
    kind: ProviderKind,
    script: Mutex<VecDeque<MockScript>>,
    default_response: Mutex<String>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockProvider {
    /// Create a new mock provider
    pub fn new() -> Self {
        Self {
            kind: ProviderKind::Mock,
            script: Mutex::new(VecDeque::new()),
            default_response: Mutex::new("mock response".to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that reports itself as a different provider kind.
    ///
    /// Used to exercise pricing and budget paths that depend on a paid
    /// provider without making network calls.
    pub fn with_kind(kind: ProviderKind) -> Self {
        Self {
            kind,
            ..Self::new()
        }
    }

    /// Set the text returned when the script runs dry
    pub fn set_default_response(&self, text: impl Into<String>) {
        *self.default_response.lock() = text.into();
    }

    /// Queue a successful response without reported usage
    pub fn push_response(&self, text: impl Into<String>) {
        self.script.lock().push_back(MockScript::Respond {
            text: text.into(),
            usage: None,
        });
    }

    /// Queue a successful response with reported usage
    pub fn push_usage_response(&self, text: impl Into<String>, usage: TokenUsage) {
        self.script.lock().push_back(MockScript::Respond {
            text: text.into(),
            usage: Some(usage),
        });
    }

    /// Queue a failure
    pub fn push_failure(&self, message: impl Into<String>) {
        self.script.lock().push_back(MockScript::Fail {
            message: message.into(),
        });
    }

    /// Number of generate calls received
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Copies of every request received, in call order
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        self.requests.lock().push(request);

        let step = self.script.lock().pop_front();
        match step {
            Some(MockScript::Respond { text, usage }) => Ok(GenerationResponse {
                text,
                usage,
                generation_time_ms: 0,
            }),
            Some(MockScript::Fail { message }) => {
                Err(Error::provider_unavailable("mock", message))
            }
            None => Ok(GenerationResponse {
                text: self.default_response.lock().clone(),
                usage: None,
                generation_time_ms: 0,
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_responses_in_order() {
        let mock = MockProvider::new();
        mock.push_response("first");
        mock.push_response("second");

        let req = GenerationRequest::new("m", "p");
        assert_eq!(mock.generate(req.clone()).await.unwrap().text, "first");
        assert_eq!(mock.generate(req.clone()).await.unwrap().text, "second");
        // Script exhausted: default response
        assert_eq!(mock.generate(req).await.unwrap().text, "mock response");
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let mock = MockProvider::new();
        mock.push_failure("boom");

        let err = mock
            .generate(GenerationRequest::new("m", "p"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_records_requests() {
        let mock = MockProvider::new();
        let req = GenerationRequest::new("llama3", "hello").with_temperature(0.0);
        let _ = mock.generate(req).await;

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "llama3");
        assert_eq!(requests[0].temperature, 0.0);
    }

    #[test]
    fn test_with_kind() {
        let mock = MockProvider::with_kind(ProviderKind::OpenAi);
        assert_eq!(mock.kind(), ProviderKind::OpenAi);
        assert_eq!(mock.name(), "mock");
    }
}
