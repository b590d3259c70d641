//! Model pricing lookup
//!
//! Static per-model rates in dollars per million tokens. Free providers
//! (local inference, mocks) always cost zero regardless of model, and
//! unknown paid models fall back to zero with a debug log rather than
//! guessing a rate.

use tracing::debug;

use crate::provider::ProviderKind;

/// Dollar rates per million tokens for one model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    /// Input (prompt) rate, $/1M tokens
    pub input_per_million: f64,
    /// Output (completion) rate, $/1M tokens
    pub output_per_million: f64,
}

/// Known hosted-model rates
const OPENAI_PRICING: &[(&str, ModelPricing)] = &[
    (
        "gpt-4o",
        ModelPricing {
            input_per_million: 2.50,
            output_per_million: 10.00,
        },
    ),
    (
        "gpt-4o-mini",
        ModelPricing {
            input_per_million: 0.15,
            output_per_million: 0.60,
        },
    ),
    (
        "gpt-4.1",
        ModelPricing {
            input_per_million: 2.00,
            output_per_million: 8.00,
        },
    ),
    (
        "gpt-4.1-mini",
        ModelPricing {
            input_per_million: 0.40,
            output_per_million: 1.60,
        },
    ),
    (
        "o3-mini",
        ModelPricing {
            input_per_million: 1.10,
            output_per_million: 4.40,
        },
    ),
];

/// Look up the rate table entry for a provider+model pair
pub fn lookup(provider: ProviderKind, model: &str) -> Option<ModelPricing> {
    if provider.is_free() {
        return None;
    }

    match provider {
        ProviderKind::OpenAi => OPENAI_PRICING
            .iter()
            .find(|(name, _)| *name == model)
            .map(|(_, pricing)| *pricing),
        ProviderKind::Local | ProviderKind::Mock => None,
    }
}

/// Dollar cost of a call
///
/// Free providers cost zero by definition; unknown paid models also
/// resolve to zero so a missing table entry never inflates a budget check.
pub fn cost_of(provider: ProviderKind, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
    match lookup(provider, model) {
        Some(pricing) => {
            (input_tokens as f64 / 1_000_000.0) * pricing.input_per_million
                + (output_tokens as f64 / 1_000_000.0) * pricing.output_per_million
        }
        None => {
            if !provider.is_free() {
                debug!(provider = %provider, model, "No pricing entry; treating as free");
            }
            0.0
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
