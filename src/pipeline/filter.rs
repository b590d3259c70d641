//! Filter stage: LLM-as-judge quality gate
//!
//! Scores every draft with the judge at temperature 0 and partitions on
//! the quality threshold. Judge failures do not kill the run; the affected
//! persona is routed to refinement, since an unjudged draft cannot be
//! trusted to pass.

use futures_util::future::join_all;
use tracing::{info, instrument, warn};

use crate::error::{Error, Result};
use crate::judge::{EvaluationCriterion, PersonaJudge};
use crate::pipeline::config::HybridConfig;
use crate::pipeline::cost::{CostStage, CostTracker};
use crate::provider::SharedProvider;
use crate::types::{DraftPersona, EvaluatedPersona, EvaluationOutcome};

// ─────────────────────────────────────────────────────────────────
// Filter Stage
// ─────────────────────────────────────────────────────────────────

pub(crate) struct FilterStage<'a> {
    judge_provider: SharedProvider,
    config: &'a HybridConfig,
    tracker: &'a CostTracker,
}

/// Partitioned output of the filter stage
pub(crate) struct FilterOutcome {
    pub passing: Vec<EvaluatedPersona>,
    pub needs_refinement: Vec<EvaluatedPersona>,
}

impl<'a> FilterStage<'a> {
    pub(crate) fn new(
        judge_provider: SharedProvider,
        config: &'a HybridConfig,
        tracker: &'a CostTracker,
    ) -> Self {
        Self {
            judge_provider,
            config,
            tracker,
        }
    }

    /// Evaluate drafts and partition them on the quality threshold.
    ///
    /// In local-only mode the judge is never invoked: every draft passes
    /// with a skipped evaluation, since there is no frontier model to
    /// refine with anyway.
    #[instrument(skip(self, drafts), fields(drafts = drafts.len()))]
    pub(crate) async fn run(&self, drafts: Vec<DraftPersona>) -> Result<FilterOutcome> {
        if self.config.is_local_only() {
            info!(passing = drafts.len(), "Local-only mode; skipping judge");
            return Ok(FilterOutcome {
                passing: drafts
                    .into_iter()
                    .map(|d| d.evaluated(EvaluationOutcome::Skipped))
                    .collect(),
                needs_refinement: Vec::new(),
            });
        }

        let judge = PersonaJudge::new(self.judge_provider.clone(), &self.config.judge_model);
        let criteria = EvaluationCriterion::default_set();

        // Judge calls are independent; run them concurrently, keeping
        // draft order in the output
        let verdicts = join_all(
            drafts
                .iter()
                .map(|draft| judge.evaluate_with_usage(&draft.core, criteria)),
        )
        .await;

        let threshold = self.config.quality_threshold;
        let mut passing = Vec::new();
        let mut needs_refinement = Vec::new();

        for (draft, (verdict, usage)) in drafts.into_iter().zip(verdicts) {
            // A malformed verdict still billed these tokens; only a call
            // that never got a reply reports zero
            if usage.total_tokens > 0 {
                self.tracker.record(
                    CostStage::Judge,
                    self.config.judge_provider,
                    &self.config.judge_model,
                    usage,
                );
            }

            let outcome = match verdict {
                Ok(result) => EvaluationOutcome::Scored(result),
                Err(e) => {
                    warn!(persona_id = %draft.core.id, error = %e, "Judge call failed; routing to refinement");
                    EvaluationOutcome::Failed {
                        error: Error::judge_failed(draft.core.id.as_str(), e.to_string())
                            .to_string(),
                    }
                }
            };

            let evaluated = draft.evaluated(outcome);
            if evaluated.evaluation.passes(threshold) {
                passing.push(evaluated);
            } else {
                needs_refinement.push(evaluated);
            }
        }

        info!(
            passing = passing.len(),
            needs_refinement = needs_refinement.len(),
            threshold,
            "Filter stage complete"
        );
        Ok(FilterOutcome {
            passing,
            needs_refinement,
        })
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
    use crate::types::{PersonaCore, TokenUsage};

    fn drafts(count: usize) -> Vec<DraftPersona> {
        (0..count)
            .map(|i| DraftPersona {
                core: PersonaCore::new(format!("P{}", i), 0, i),
            })
            .collect()
    }

    fn verdict_json(score: f64) -> String {
        format!("{{\"overall_score\": {}, \"scores\": [], \"feedback\": null}}", score)
    }

    fn hybrid_config() -> HybridConfig {
        HybridConfig::builder()
            .frontier(ProviderKind::OpenAi, "gpt-4o")
            .judge(ProviderKind::OpenAi, "gpt-4o-mini")
            .quality_threshold(0.7)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_local_only_passes_everything_without_judge_calls() {
        let mock = Arc::new(MockProvider::new());
        let config = HybridConfig::builder().build().unwrap();
        let tracker = CostTracker::new();
        let stage = FilterStage::new(mock.clone(), &config, &tracker);

        let outcome = stage.run(drafts(3)).await.unwrap();
        assert_eq!(outcome.passing.len(), 3);
        assert!(outcome.needs_refinement.is_empty());
        assert_eq!(mock.call_count(), 0);
        assert!(outcome
            .passing
            .iter()
            .all(|p| matches!(p.evaluation, EvaluationOutcome::Skipped)));
    }

    #[tokio::test]
    async fn test_partitions_on_threshold() {
        let mock = Arc::new(MockProvider::new());
        mock.push_response(verdict_json(0.9));
        mock.push_response(verdict_json(0.7));
        mock.push_response(verdict_json(0.4));

        let config = hybrid_config();
        let tracker = CostTracker::new();
        let stage = FilterStage::new(mock, &config, &tracker);

        let outcome = stage.run(drafts(3)).await.unwrap();
        // 0.9 and 0.7 clear the 0.7 threshold (inclusive)
        assert_eq!(outcome.passing.len(), 2);
        assert_eq!(outcome.needs_refinement.len(), 1);
        assert_eq!(outcome.needs_refinement[0].core.name, "P2");
    }

    #[tokio::test]
    async fn test_judge_failure_routes_to_refinement() {
        let mock = Arc::new(MockProvider::new());
        mock.push_failure("judge backend down");
        mock.push_response(verdict_json(0.9));

        let config = hybrid_config();
        let tracker = CostTracker::new();
        let stage = FilterStage::new(mock, &config, &tracker);

        let outcome = stage.run(drafts(2)).await.unwrap();
        assert_eq!(outcome.passing.len(), 1);
        assert_eq!(outcome.needs_refinement.len(), 1);
        assert!(matches!(
            outcome.needs_refinement[0].evaluation,
            EvaluationOutcome::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn test_malformed_verdict_routes_to_refinement() {
        let mock = Arc::new(MockProvider::new());
        mock.push_response("this is not json at all");

        let config = hybrid_config();
        let tracker = CostTracker::new();
        let stage = FilterStage::new(mock, &config, &tracker);

        let outcome = stage.run(drafts(1)).await.unwrap();
        assert!(outcome.passing.is_empty());
        assert_eq!(outcome.needs_refinement.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_verdict_usage_still_recorded() {
        let mock = Arc::new(MockProvider::new());
        mock.push_usage_response("garbled reply", TokenUsage::new(1_000_000, 1_000_000));

        let config = hybrid_config();
        let tracker = CostTracker::new();
        let stage = FilterStage::new(mock, &config, &tracker);

        let outcome = stage.run(drafts(1)).await.unwrap();
        assert_eq!(outcome.needs_refinement.len(), 1);

        // The judge billed those tokens even though the verdict was
        // unusable; the budget must see them
        let summary = tracker.snapshot();
        assert_eq!(summary.total_tokens, 2_000_000);
        assert!(summary.total_cost > 0.0);
        assert_eq!(summary.stages["judge"].calls, 1);
    }

    #[tokio::test]
    async fn test_transport_failure_records_no_usage() {
        let mock = Arc::new(MockProvider::new());
        mock.push_failure("judge backend down");

        let config = hybrid_config();
        let tracker = CostTracker::new();
        let stage = FilterStage::new(mock, &config, &tracker);

        let outcome = stage.run(drafts(1)).await.unwrap();
        assert_eq!(outcome.needs_refinement.len(), 1);
        assert_eq!(tracker.total_tokens(), 0);
        assert!(tracker.snapshot().stages.is_empty());
    }

    #[tokio::test]
    async fn test_records_judge_usage() {
        let mock = Arc::new(MockProvider::new());
        mock.push_response(verdict_json(0.9));

        let config = hybrid_config();
        let tracker = CostTracker::new();
        let stage = FilterStage::new(mock, &config, &tracker);

        stage.run(drafts(1)).await.unwrap();
        let summary = tracker.snapshot();
        assert_eq!(summary.stages["judge"].calls, 1);
    }
}
