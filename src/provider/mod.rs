//! LLM provider abstraction
//!
//! Providers turn a prompt into text plus token usage. The pipeline never
//! talks to a provider API directly; it goes through the [`LlmProvider`]
//! trait and the startup-time [`ProviderRegistry`].

mod local;
#[cfg(test)]
mod mock;
mod openai;
mod registry;
mod traits;

pub use local::{LocalProvider, LocalProviderConfig};
#[cfg(test)]
pub use mock::MockProvider;
pub use openai::{OpenAiProvider, OpenAiProviderConfig};
pub use registry::{ProviderKind, ProviderRegistry};
pub use traits::{GenerationRequest, GenerationResponse, LlmProvider, SharedProvider};
