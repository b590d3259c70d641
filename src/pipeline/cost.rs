//! Per-stage cost and token accounting
//!
//! Every provider call in a run records its usage here. The refine stage
//! consults the running dollar total before each persona to enforce the
//! budget, and the final summary lands in the run result.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::pricing;
use crate::provider::ProviderKind;
use crate::types::TokenUsage;

// ─────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────

/// Which pipeline stage a provider call belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostStage {
    LocalDraft,
    Judge,
    FrontierRefine,
}

impl CostStage {
    pub fn name(&self) -> &'static str {
        match self {
            CostStage::LocalDraft => "local_draft",
            CostStage::Judge => "judge",
            CostStage::FrontierRefine => "frontier_refine",
        }
    }
}

/// One provider call's accounting entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub stage: CostStage,
    pub provider: ProviderKind,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
}

// ─────────────────────────────────────────────────────────────────
// Tracker
// ─────────────────────────────────────────────────────────────────

/// Thread-safe accumulator of usage records for one run
#[derive(Debug, Default)]
pub struct CostTracker {
    records: Mutex<Vec<UsageRecord>>,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one call's usage, pricing it by provider and model
    pub fn record(&self, stage: CostStage, provider: ProviderKind, model: &str, usage: TokenUsage) {
        let input_tokens = u64::from(usage.prompt_tokens);
        let output_tokens = u64::from(usage.completion_tokens);
        let cost = pricing::cost_of(provider, model, input_tokens, output_tokens);
        trace!(
            stage = stage.name(),
            provider = %provider,
            model,
            input_tokens,
            output_tokens,
            cost,
            "Recorded usage"
        );
        self.records.lock().push(UsageRecord {
            stage,
            provider,
            model: model.to_string(),
            input_tokens,
            output_tokens,
            cost,
        });
    }

    /// Running dollar total across all stages
    pub fn total_cost(&self) -> f64 {
        self.records.lock().iter().map(|r| r.cost).sum()
    }

    /// Running token total (input + output) across all stages
    pub fn total_tokens(&self) -> u64 {
        self.records
            .lock()
            .iter()
            .map(|r| r.input_tokens + r.output_tokens)
            .sum()
    }

    /// Immutable summary for the run result
    pub fn snapshot(&self) -> CostSummary {
        let records = self.records.lock().clone();
        let mut stages: BTreeMap<CostStage, StageCost> = BTreeMap::new();
        for record in &records {
            let entry = stages.entry(record.stage).or_default();
            entry.calls += 1;
            entry.input_tokens += record.input_tokens;
            entry.output_tokens += record.output_tokens;
            entry.cost += record.cost;
        }
        CostSummary {
            total_cost: records.iter().map(|r| r.cost).sum(),
            total_tokens: records
                .iter()
                .map(|r| r.input_tokens + r.output_tokens)
                .sum(),
            stages: stages
                .into_iter()
                .map(|(stage, cost)| (stage.name().to_string(), cost))
                .collect(),
            records,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Summary
// ─────────────────────────────────────────────────────────────────

/// Aggregated usage for one stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageCost {
    pub calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
}

/// Final cost report for a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostSummary {
    pub total_cost: f64,
    pub total_tokens: u64,
    pub stages: BTreeMap<String, StageCost>,
    pub records: Vec<UsageRecord>,
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
