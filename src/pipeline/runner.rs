//! Pipeline orchestration and run results

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Map, Value};
use tracing::{info, instrument};

use crate::error::Result;
use crate::loader::SourceData;
use crate::pipeline::config::HybridConfig;
use crate::pipeline::cost::{CostSummary, CostTracker};
use crate::pipeline::draft::DraftStage;
use crate::pipeline::filter::FilterStage;
use crate::pipeline::refine::RefineStage;
use crate::provider::ProviderRegistry;
use crate::types::PersonaRecord;

// ─────────────────────────────────────────────────────────────────
// Pipeline
// ─────────────────────────────────────────────────────────────────

/// The three-stage hybrid pipeline: draft, filter, refine.
pub struct HybridPipeline {
    config: HybridConfig,
    registry: Arc<ProviderRegistry>,
}

impl HybridPipeline {
    /// Create a pipeline, verifying every provider the config names is
    /// actually registered so a run cannot fail halfway on a missing one.
    pub fn new(config: HybridConfig, registry: Arc<ProviderRegistry>) -> Result<Self> {
        registry.get(config.local_provider)?;
        registry.get(config.judge_provider)?;
        if let Some(frontier) = config.frontier_provider {
            registry.get(frontier)?;
        }
        Ok(Self { config, registry })
    }

    pub fn config(&self) -> &HybridConfig {
        &self.config
    }

    /// Generate `count` personas from the given source data.
    pub async fn run(&self, source: &SourceData, count: usize) -> Result<HybridResult> {
        self.run_with_metadata(source, count, Map::new()).await
    }

    /// Like [`run`], attaching caller metadata to the result.
    ///
    /// [`run`]: HybridPipeline::run
    #[instrument(skip(self, source, metadata), fields(count))]
    pub async fn run_with_metadata(
        &self,
        source: &SourceData,
        count: usize,
        metadata: Map<String, Value>,
    ) -> Result<HybridResult> {
        let started = Instant::now();
        let tracker = CostTracker::new();

        let local = self.registry.get(self.config.local_provider)?;
        let drafts = DraftStage::new(local, &self.config, &tracker)
            .run(source, count)
            .await?;
        let draft_count = drafts.len();

        let judge = self.registry.get(self.config.judge_provider)?;
        let outcome = FilterStage::new(judge, &self.config, &tracker)
            .run(drafts)
            .await?;
        let passing_count = outcome.passing.len();

        let refined_records = match self.config.frontier_provider {
            Some(frontier) => {
                let provider = self.registry.get(frontier)?;
                RefineStage::new(provider, &self.config, &tracker)
                    .run(outcome.needs_refinement)
                    .await
            }
            None => outcome
                .needs_refinement
                .into_iter()
                .map(PersonaRecord::Evaluated)
                .collect(),
        };

        // Passing personas first, then refinement results, each group in
        // draft order
        let mut personas: Vec<PersonaRecord> = outcome
            .passing
            .into_iter()
            .map(PersonaRecord::Evaluated)
            .collect();
        personas.extend(refined_records);

        let refined_count = personas.iter().filter(|p| p.is_refined()).count();
        let result = HybridResult {
            personas,
            draft_count,
            passing_count,
            refined_count,
            cost: tracker.snapshot(),
            config: self.config.clone(),
            generation_time: started.elapsed(),
            metadata,
        };

        info!(
            personas = result.persona_count(),
            passing = passing_count,
            refined = refined_count,
            cost = result.total_cost(),
            elapsed_ms = result.generation_time.as_millis() as u64,
            "Pipeline run complete"
        );
        Ok(result)
    }

    /// Synchronous wrapper for callers without a runtime.
    pub fn run_blocking(&self, source: &SourceData, count: usize) -> Result<HybridResult> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(crate::error::Error::Io)?;
        runtime.block_on(self.run(source, count))
    }
}

// ─────────────────────────────────────────────────────────────────
// Result
// ─────────────────────────────────────────────────────────────────

/// Everything a pipeline run produced.
#[derive(Debug)]
pub struct HybridResult {
    /// Final personas, stage-tagged
    pub personas: Vec<PersonaRecord>,

    /// How many drafts the local model produced
    pub draft_count: usize,

    /// How many drafts passed the filter without refinement
    pub passing_count: usize,

    /// How many personas were successfully refined
    pub refined_count: usize,

    /// Per-stage cost breakdown
    pub cost: CostSummary,

    /// The config this run used
    pub config: HybridConfig,

    /// Wall-clock duration of the run
    pub generation_time: Duration,

    /// Caller-supplied metadata, passed through untouched
    pub metadata: Map<String, Value>,
}

impl HybridResult {
    pub fn persona_count(&self) -> usize {
        self.personas.len()
    }

    pub fn total_cost(&self) -> f64 {
        self.cost.total_cost
    }

    pub fn total_tokens(&self) -> u64 {
        self.cost.total_tokens
    }

    /// Serialize the run summary as a JSON object.
    pub fn to_dict(&self) -> Value {
        json!({
            "persona_count": self.persona_count(),
            "draft_count": self.draft_count,
            "passing_count": self.passing_count,
            "refined_count": self.refined_count,
            "generation_time": self.generation_time.as_secs_f64(),
            "costs": self.cost,
            "config": self.config,
            "metadata": Value::Object(self.metadata.clone()),
        })
    }

    /// Full export: the run summary plus every persona.
    pub fn to_json(&self) -> Result<Value> {
        let mut object = self.to_dict();
        if let Value::Object(map) = &mut object {
            map.insert("personas".to_string(), serde_json::to_value(&self.personas)?);
        }
        Ok(object)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::provider::{MockProvider, ProviderKind};

    fn registry_with_mock(mock: Arc<MockProvider>) -> Arc<ProviderRegistry> {
        let mut registry = ProviderRegistry::new();
        registry.register(mock);
        Arc::new(registry)
    }

    fn local_only_config() -> HybridConfig {
        HybridConfig::builder()
            .local(ProviderKind::Mock, "mock-model")
            .build()
            .unwrap()
    }

    fn personas_json(names: &[&str]) -> String {
        let items = names
            .iter()
            .map(|n| format!("{{\"name\": \"{}\"}}", n))
            .collect::<Vec<_>>()
            .join(", ");
        format!("[{}]", items)
    }

    #[test]
    fn test_new_rejects_unregistered_provider() {
        let registry = Arc::new(ProviderRegistry::new());
        let config = local_only_config();
        assert!(HybridPipeline::new(config, registry).is_err());
    }

    #[tokio::test]
    async fn test_local_only_run() {
        let mock = Arc::new(MockProvider::new());
        mock.push_response(personas_json(&["Maya", "Theo"]));

        let pipeline =
            HybridPipeline::new(local_only_config(), registry_with_mock(mock.clone())).unwrap();
        let source = SourceData::from_text("notes").unwrap();
        let result = pipeline.run(&source, 2).await.unwrap();

        assert_eq!(result.persona_count(), 2);
        assert_eq!(result.draft_count, 2);
        assert_eq!(result.passing_count, 2);
        assert_eq!(result.refined_count, 0);
        assert_eq!(result.total_cost(), 0.0);
        // One draft call, no judge, no refine
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_to_dict_key_set() {
        let mock = Arc::new(MockProvider::new());
        mock.push_response(personas_json(&["Maya"]));

        let pipeline =
            HybridPipeline::new(local_only_config(), registry_with_mock(mock)).unwrap();
        let source = SourceData::from_text("notes").unwrap();
        let result = pipeline.run(&source, 1).await.unwrap();

        let dict = result.to_dict();
        let Value::Object(map) = &dict else {
            panic!("expected object");
        };
        let mut keys: Vec<&str> = map.keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "config",
                "costs",
                "draft_count",
                "generation_time",
                "metadata",
                "passing_count",
                "persona_count",
                "refined_count",
            ]
        );
    }

    #[test]
    fn test_run_blocking() {
        let mock = Arc::new(MockProvider::new());
        mock.push_response(personas_json(&["Maya"]));

        let pipeline = HybridPipeline::new(local_only_config(), registry_with_mock(mock)).unwrap();
        let source = SourceData::from_text("notes").unwrap();
        let result = pipeline.run_blocking(&source, 1).unwrap();
        assert_eq!(result.persona_count(), 1);
    }

    #[tokio::test]
    async fn test_hybrid_run_refines_failures() {
        // Local mock drafts, OpenAI-kind mock judges and refines
        let local = Arc::new(MockProvider::new());
        local.push_response(personas_json(&["Maya", "Theo", "Iris"]));

        let frontier = Arc::new(MockProvider::with_kind(ProviderKind::OpenAi));
        // Three judge verdicts: two pass at 0.7, one fails
        frontier.push_response("{\"overall_score\": 0.9, \"scores\": [], \"feedback\": null}");
        frontier.push_response("{\"overall_score\": 0.8, \"scores\": [], \"feedback\": null}");
        frontier.push_response("{\"overall_score\": 0.3, \"scores\": [], \"feedback\": null}");
        // One refinement for the failing draft
        frontier.push_response("{\"name\": \"Iris (improved)\", \"occupation\": \"teacher\"}");

        let mut registry = ProviderRegistry::new();
        registry.register(local.clone());
        registry.register(frontier.clone());

        let config = HybridConfig::builder()
            .local(ProviderKind::Mock, "mock-model")
            .frontier(ProviderKind::OpenAi, "gpt-4o")
            .quality_threshold(0.7)
            .build()
            .unwrap();

        let pipeline = HybridPipeline::new(config, Arc::new(registry)).unwrap();
        let source = SourceData::from_text("notes").unwrap();
        let result = pipeline.run(&source, 3).await.unwrap();

        assert_eq!(result.draft_count, 3);
        assert_eq!(result.passing_count, 2);
        assert_eq!(result.refined_count, 1);
        assert_eq!(result.persona_count(), 3);
        assert_eq!(local.call_count(), 1);
        // 3 judge calls + 1 refinement
        assert_eq!(frontier.call_count(), 4);

        let refined: Vec<_> = result.personas.iter().filter(|p| p.is_refined()).collect();
        assert_eq!(refined.len(), 1);
        assert_eq!(refined[0].core().name, "Iris (improved)");

        // Judge and refine tokens were estimated and priced on gpt-4o
        assert!(result.total_tokens() > 0);
        assert!(result.total_cost() > 0.0);
        assert_eq!(result.cost.stages["judge"].calls, 3);
        assert_eq!(result.cost.stages["frontier_refine"].calls, 1);
    }

    #[tokio::test]
    async fn test_metadata_passthrough() {
        let mock = Arc::new(MockProvider::new());
        mock.push_response(personas_json(&["Maya"]));

        let pipeline = HybridPipeline::new(local_only_config(), registry_with_mock(mock)).unwrap();
        let source = SourceData::from_text("notes").unwrap();

        let mut metadata = Map::new();
        metadata.insert("run_label".to_string(), json!("smoke"));
        let result = pipeline
            .run_with_metadata(&source, 1, metadata)
            .await
            .unwrap();
        assert_eq!(result.to_dict()["metadata"]["run_label"], "smoke");
    }
}
