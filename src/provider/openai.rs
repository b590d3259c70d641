//! OpenAI-compatible API provider
//!
//! Speaks the chat-completions wire shape used by OpenAI, Ollama, vLLM and
//! LM Studio. The shared [`ChatClient`] carries the HTTP plumbing and the
//! bounded retry loop; the hosted and local providers both build on it.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::provider::{GenerationRequest, GenerationResponse, LlmProvider, ProviderKind};
use crate::types::TokenUsage;

// ─────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for the hosted OpenAI-compatible provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiProviderConfig {
    /// API base URL (e.g., "https://api.openai.com/v1")
    pub base_url: String,

    /// API key (empty string for servers without auth)
    pub api_key: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retries on transient errors
    pub max_retries: u32,
}

impl Default for OpenAiProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Wire types (request/response)
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

// ─────────────────────────────────────────────────────────────────
// Chat Client
// ─────────────────────────────────────────────────────────────────

/// HTTP client for the chat-completions endpoint with retry logic
pub(crate) struct ChatClient {
    base_url: String,
    api_key: String,
    max_retries: u32,
    timeout_secs: u64,
    provider_name: &'static str,
    client: Client,
}

impl ChatClient {
    pub(crate) fn new(
        provider_name: &'static str,
        base_url: String,
        api_key: String,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            api_key,
            max_retries,
            timeout_secs,
            provider_name,
            client,
        })
    }

    /// Build the authorization header value (if API key is set)
    fn auth_header(&self) -> Option<String> {
        if self.api_key.is_empty() {
            None
        } else {
            Some(format!("Bearer {}", self.api_key))
        }
    }

    /// Make a chat completion request with retry on transient failures
    pub(crate) async fn chat(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let start = Instant::now();

        let mut messages = Vec::new();
        if let Some(ref system) = request.system_prompt {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        let request_body = ChatCompletionRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let mut last_error: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_millis(500 * 2u64.pow(attempt - 1));
                debug!(attempt, ?backoff, "Retrying after error");
                tokio::time::sleep(backoff).await;
            }

            let mut req = self.client.post(&url).json(&request_body);
            if let Some(ref auth) = self.auth_header() {
                req = req.header("Authorization", auth);
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        match response.json::<ChatCompletionResponse>().await {
                            Ok(parsed) => {
                                let choice = parsed.choices.first().ok_or_else(|| {
                                    Error::provider_response(
                                        self.provider_name,
                                        "No choices in API response",
                                    )
                                })?;

                                let text = choice.message.content.clone().unwrap_or_default();
                                let usage = parsed
                                    .usage
                                    .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens));

                                return Ok(GenerationResponse {
                                    text,
                                    usage,
                                    generation_time_ms: start.elapsed().as_millis() as u64,
                                });
                            }
                            Err(e) => {
                                // Malformed body: not retried
                                return Err(Error::provider_response(
                                    self.provider_name,
                                    format!("Failed to parse API response: {}", e),
                                ));
                            }
                        }
                    } else if status.as_u16() == 429 || status.is_server_error() {
                        // Retryable error
                        let body = response.text().await.unwrap_or_default();
                        warn!(status = %status, attempt, "Retryable API error: {}", body);
                        last_error = Some(Error::provider_unavailable(
                            self.provider_name,
                            format!("API error {}: {}", status, body),
                        ));
                    } else {
                        // Non-retryable error
                        let body = response.text().await.unwrap_or_default();
                        return Err(Error::provider_response(
                            self.provider_name,
                            format!("API error {}: {}", status, body),
                        ));
                    }
                }
                Err(e) => {
                    if e.is_timeout() {
                        warn!(attempt, error = %e, "Request timed out");
                        last_error = Some(Error::ProviderTimeout {
                            provider: self.provider_name.to_string(),
                            timeout_secs: self.timeout_secs,
                        });
                    } else if e.is_connect() {
                        warn!(attempt, error = %e, "Retryable connection error");
                        last_error = Some(Error::provider_unavailable(
                            self.provider_name,
                            format!("Connection error: {}", e),
                        ));
                    } else {
                        return Err(Error::provider_unavailable(
                            self.provider_name,
                            format!("Request error: {}", e),
                        ));
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::provider_unavailable(self.provider_name, "All retry attempts exhausted")
        }))
    }
}

// ─────────────────────────────────────────────────────────────────
// OpenAI Provider
// ─────────────────────────────────────────────────────────────────

/// Hosted OpenAI-compatible API provider
pub struct OpenAiProvider {
    chat: ChatClient,
}

impl OpenAiProvider {
    /// Create a new provider with the given configuration
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        tracing::info!(base_url = %config.base_url, "OpenAI-compatible provider created");
        Ok(Self {
            chat: ChatClient::new(
                "openai",
                config.base_url,
                config.api_key,
                config.timeout_secs,
                config.max_retries,
            )?,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        self.chat.chat(&request).await
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OpenAiProviderConfig::default();
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert!(config.api_key.is_empty());
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn test_provider_identity() {
        let provider = OpenAiProvider::new(OpenAiProviderConfig::default()).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.kind(), ProviderKind::OpenAi);
    }

    #[test]
    fn test_auth_header() {
        let chat = ChatClient::new(
            "openai",
            "https://api.openai.com/v1".to_string(),
            "sk-test-123".to_string(),
            10,
            0,
        )
        .unwrap();
        assert_eq!(chat.auth_header(), Some("Bearer sk-test-123".to_string()));

        let no_key = ChatClient::new(
            "local",
            "http://localhost:11434/v1".to_string(),
            String::new(),
            10,
            0,
        )
        .unwrap();
        assert_eq!(no_key.auth_header(), None);
    }
}
