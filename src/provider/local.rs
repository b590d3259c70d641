//! Local inference provider
//!
//! Talks to an Ollama-style local endpoint over the same chat-completions
//! wire shape as the hosted provider. Usage on this provider is always
//! free; pricing treats it as zero cost.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::provider::openai::ChatClient;
use crate::provider::{GenerationRequest, GenerationResponse, LlmProvider, ProviderKind};

/// Configuration for the local provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalProviderConfig {
    /// Endpoint base URL
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retries on transient errors
    pub max_retries: u32,
}

impl Default for LocalProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// Local (free) inference provider
pub struct LocalProvider {
    chat: ChatClient,
}

impl LocalProvider {
    /// Create a new local provider with the given configuration
    pub fn new(config: LocalProviderConfig) -> Result<Self> {
        tracing::info!(base_url = %config.base_url, "Local provider created");
        Ok(Self {
            // Local servers do not use auth
            chat: ChatClient::new(
                "local",
                config.base_url,
                String::new(),
                config.timeout_secs,
                config.max_retries,
            )?,
        })
    }
}

#[async_trait]
impl LlmProvider for LocalProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        self.chat.chat(&request).await
    }
}
