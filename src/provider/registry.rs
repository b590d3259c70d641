//! Provider registry
//!
//! Providers are registered explicitly at startup (in `main` or in tests)
//! and looked up by kind. There is no global mutable registry; the
//! registry instance is passed into the pipeline that needs it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::provider::SharedProvider;

// ─────────────────────────────────────────────────────────────────
// Provider Kind
// ─────────────────────────────────────────────────────────────────

/// Supported provider kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// Local inference endpoint (Ollama-style); always free
    Local,
    /// OpenAI-compatible hosted API
    OpenAi,
    /// Mock provider (for testing)
    Mock,
}

impl ProviderKind {
    /// Get all provider kinds
    pub fn all() -> &'static [ProviderKind] {
        &[ProviderKind::Local, ProviderKind::OpenAi, ProviderKind::Mock]
    }

    /// Get the provider name
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Local => "local",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Mock => "mock",
        }
    }

    /// Whether usage on this provider never incurs dollar cost
    pub fn is_free(&self) -> bool {
        match self {
            ProviderKind::Local | ProviderKind::Mock => true,
            ProviderKind::OpenAi => false,
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "local" | "ollama" => Some(ProviderKind::Local),
            "openai" => Some(ProviderKind::OpenAi),
            "mock" => Some(ProviderKind::Mock),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ProviderKind::parse(s).ok_or_else(|| {
            Error::config_field_invalid(
                "provider",
                format!("Unknown provider '{}'. Valid: local, openai, mock", s),
            )
        })
    }
}

// ─────────────────────────────────────────────────────────────────
// Provider Registry
// ─────────────────────────────────────────────────────────────────

/// Registration table mapping provider kinds to implementations
///
/// Built once at startup; read-only afterwards. Providers take `&self` in
/// `generate`, so shared references are enough and no locking is needed.
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, SharedProvider>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Register a provider under its own kind
    pub fn register(&mut self, provider: SharedProvider) {
        let kind = provider.kind();
        tracing::info!(provider = %kind, "Provider registered");
        self.providers.insert(kind, provider);
    }

    /// Look up a provider, failing if it was never registered
    pub fn get(&self, kind: ProviderKind) -> Result<SharedProvider> {
        self.providers
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::ProviderNotRegistered {
                provider: kind.name().to_string(),
            })
    }

    /// Check whether a kind is registered
    pub fn contains(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    /// All registered kinds, in a stable order
    pub fn registered(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<ProviderKind> = self.providers.keys().copied().collect();
        kinds.sort_by_key(|k| k.name());
        kinds
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
