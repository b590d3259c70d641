//! Pipeline configuration and validation

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::provider::ProviderKind;

// ─────────────────────────────────────────────────────────────────
// Hybrid Config
// ─────────────────────────────────────────────────────────────────

/// Validated configuration for one pipeline run.
///
/// Construct through [`HybridConfig::builder`]; `build()` rejects any
/// combination the pipeline cannot execute, so a constructed config is
/// always runnable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridConfig {
    /// Provider used for the draft stage
    pub local_provider: ProviderKind,

    /// Model used for the draft stage
    pub local_model: String,

    /// Provider used for the refine stage; None disables refinement and
    /// the judge (local-only mode)
    pub frontier_provider: Option<ProviderKind>,

    /// Model used for the refine stage
    pub frontier_model: Option<String>,

    /// Provider used for the filter stage's judge
    pub judge_provider: ProviderKind,

    /// Model used for the filter stage's judge
    pub judge_model: String,

    /// Minimum judge score for a draft to pass, in [0, 1]
    pub quality_threshold: f64,

    /// Dollar budget for the whole run; None means unlimited
    pub max_cost: Option<f64>,

    /// Personas requested per draft call
    pub batch_size: usize,

    /// Frontier attempts per persona before giving up
    pub max_refinement_attempts: u32,

    /// Sampling temperature for drafting
    pub draft_temperature: f32,

    /// Sampling temperature for refinement
    pub refine_temperature: f32,
}

impl HybridConfig {
    pub fn builder() -> HybridConfigBuilder {
        HybridConfigBuilder::default()
    }

    /// Whether a frontier model is configured, enabling filter + refine
    pub fn is_hybrid_mode(&self) -> bool {
        self.frontier_provider.is_some()
    }

    /// Local-only runs skip the judge and refinement entirely
    pub fn is_local_only(&self) -> bool {
        !self.is_hybrid_mode()
    }
}

// ─────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────

/// Builder for [`HybridConfig`]
#[derive(Debug, Clone)]
pub struct HybridConfigBuilder {
    local_provider: ProviderKind,
    local_model: String,
    frontier_provider: Option<ProviderKind>,
    frontier_model: Option<String>,
    judge_provider: Option<ProviderKind>,
    judge_model: Option<String>,
    quality_threshold: f64,
    max_cost: Option<f64>,
    batch_size: usize,
    max_refinement_attempts: u32,
    draft_temperature: f32,
    refine_temperature: f32,
}

impl Default for HybridConfigBuilder {
    fn default() -> Self {
        Self {
            local_provider: ProviderKind::Local,
            local_model: "llama3".to_string(),
            frontier_provider: None,
            frontier_model: None,
            judge_provider: None,
            judge_model: None,
            quality_threshold: 0.7,
            max_cost: None,
            batch_size: 5,
            max_refinement_attempts: 2,
            draft_temperature: 0.9,
            refine_temperature: 0.7,
        }
    }
}

impl HybridConfigBuilder {
    pub fn local(mut self, provider: ProviderKind, model: impl Into<String>) -> Self {
        self.local_provider = provider;
        self.local_model = model.into();
        self
    }

    pub fn frontier(mut self, provider: ProviderKind, model: impl Into<String>) -> Self {
        self.frontier_provider = Some(provider);
        self.frontier_model = Some(model.into());
        self
    }

    pub fn judge(mut self, provider: ProviderKind, model: impl Into<String>) -> Self {
        self.judge_provider = Some(provider);
        self.judge_model = Some(model.into());
        self
    }

    pub fn quality_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = threshold;
        self
    }

    pub fn max_cost(mut self, max_cost: f64) -> Self {
        self.max_cost = Some(max_cost);
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn max_refinement_attempts(mut self, attempts: u32) -> Self {
        self.max_refinement_attempts = attempts;
        self
    }

    pub fn draft_temperature(mut self, temperature: f32) -> Self {
        self.draft_temperature = temperature;
        self
    }

    pub fn refine_temperature(mut self, temperature: f32) -> Self {
        self.refine_temperature = temperature;
        self
    }

    /// Validate and build.
    ///
    /// When no judge is set explicitly, the frontier model (if any) doubles
    /// as the judge; a local-only config judges nothing so the judge slot
    /// falls back to the local model.
    pub fn build(self) -> Result<HybridConfig> {
        if !(0.0..=1.0).contains(&self.quality_threshold) {
            return Err(Error::config_field_invalid(
                "quality_threshold",
                format!(
                    "quality_threshold must be between 0.0 and 1.0, got {}",
                    self.quality_threshold
                ),
            ));
        }

        if let Some(max_cost) = self.max_cost {
            if max_cost <= 0.0 {
                return Err(Error::config_field_invalid(
                    "max_cost",
                    format!("max_cost must be positive, got {}", max_cost),
                ));
            }
        }

        if self.batch_size < 1 {
            return Err(Error::config_field_invalid(
                "batch_size",
                "batch_size must be at least 1",
            ));
        }

        if self.max_refinement_attempts < 1 {
            return Err(Error::config_field_invalid(
                "max_refinement_attempts",
                "max_refinement_attempts must be at least 1",
            ));
        }

        match (&self.frontier_provider, &self.frontier_model) {
            (Some(_), Some(model)) if model.is_empty() => {
                return Err(Error::config_field_invalid(
                    "frontier_model",
                    "Must not be empty when a frontier provider is set",
                ));
            }
            (Some(_), None) => {
                return Err(Error::config_field_invalid(
                    "frontier_model",
                    "A frontier provider requires a frontier model",
                ));
            }
            _ => {}
        }

        let (judge_provider, judge_model) = match (self.judge_provider, self.judge_model) {
            (Some(provider), Some(model)) => (provider, model),
            _ => match (&self.frontier_provider, &self.frontier_model) {
                (Some(provider), Some(model)) => (*provider, model.clone()),
                _ => (self.local_provider, self.local_model.clone()),
            },
        };

        Ok(HybridConfig {
            local_provider: self.local_provider,
            local_model: self.local_model,
            frontier_provider: self.frontier_provider,
            frontier_model: self.frontier_model,
            judge_provider,
            judge_model,
            quality_threshold: self.quality_threshold,
            max_cost: self.max_cost,
            batch_size: self.batch_size,
            max_refinement_attempts: self.max_refinement_attempts,
            draft_temperature: self.draft_temperature,
            refine_temperature: self.refine_temperature,
        })
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
