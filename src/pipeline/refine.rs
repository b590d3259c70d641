//! Refine stage: selective frontier rewriting
//!
//! Rewrites only the personas the judge rejected, one at a time, checking
//! the running cost against the budget before each persona. Refinement is
//! best-effort: a persona whose attempts all fail keeps its draft content
//! with the error recorded, and a budget stop leaves the remainder
//! evaluated but unrefined.

use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::error::{Error, Result};
use crate::judge::extract_json;
use crate::pipeline::config::HybridConfig;
use crate::pipeline::cost::{CostStage, CostTracker};
use crate::provider::{GenerationRequest, SharedProvider};
use crate::types::{EvaluatedPersona, EvaluationOutcome, PersonaCore, PersonaRecord, RefinedPersona};

const REFINE_SYSTEM_PROMPT: &str = "You improve user-research personas that failed a quality \
review. You reply with JSON only, no prose before or after.";

// ─────────────────────────────────────────────────────────────────
// Refine Stage
// ─────────────────────────────────────────────────────────────────

pub(crate) struct RefineStage<'a> {
    provider: SharedProvider,
    config: &'a HybridConfig,
    tracker: &'a CostTracker,
}

impl<'a> RefineStage<'a> {
    pub(crate) fn new(
        provider: SharedProvider,
        config: &'a HybridConfig,
        tracker: &'a CostTracker,
    ) -> Self {
        Self {
            provider,
            config,
            tracker,
        }
    }

    /// Refine each rejected persona sequentially, stopping when the budget
    /// would be exceeded. Always returns one record per input persona.
    #[instrument(skip(self, rejected), fields(rejected = rejected.len()))]
    pub(crate) async fn run(&self, rejected: Vec<EvaluatedPersona>) -> Vec<PersonaRecord> {
        let model = match &self.config.frontier_model {
            Some(model) => model.clone(),
            // No frontier model: nothing to refine with
            None => return rejected.into_iter().map(PersonaRecord::Evaluated).collect(),
        };
        let Some(provider_kind) = self.config.frontier_provider else {
            return rejected.into_iter().map(PersonaRecord::Evaluated).collect();
        };

        let mut records = Vec::with_capacity(rejected.len());
        let mut budget_hit = false;

        for persona in rejected {
            if budget_hit {
                records.push(PersonaRecord::Evaluated(persona));
                continue;
            }

            if let Some(max_cost) = self.config.max_cost {
                if self.tracker.total_cost() >= max_cost {
                    info!(
                        total_cost = self.tracker.total_cost(),
                        max_cost, "Budget reached; skipping remaining refinements"
                    );
                    budget_hit = true;
                    records.push(PersonaRecord::Evaluated(persona));
                    continue;
                }
            }

            records.push(self.refine_one(persona, &model, provider_kind).await);
        }

        let refined = records.iter().filter(|r| r.is_refined()).count();
        info!(refined, total = records.len(), "Refine stage complete");
        records
    }

    async fn refine_one(
        &self,
        persona: EvaluatedPersona,
        model: &str,
        provider_kind: crate::provider::ProviderKind,
    ) -> PersonaRecord {
        let mut last_error = String::new();
        let mut attempts = 0u32;

        while attempts < self.config.max_refinement_attempts {
            attempts += 1;
            match self.attempt(&persona, model, provider_kind).await {
                Ok(core) => {
                    return PersonaRecord::Refined(RefinedPersona {
                        refined_from: persona.core.id.clone(),
                        core,
                        evaluation: persona.evaluation,
                        attempts,
                        refinement_error: None,
                    });
                }
                Err(e) => {
                    warn!(
                        persona_id = %persona.core.id,
                        attempt = attempts,
                        error = %e,
                        "Refinement attempt failed"
                    );
                    last_error = e.to_string();
                }
            }
        }

        // Every attempt failed: keep the draft content, record the error
        PersonaRecord::Refined(RefinedPersona {
            refined_from: persona.core.id.clone(),
            core: persona.core,
            evaluation: persona.evaluation,
            attempts,
            refinement_error: Some(last_error),
        })
    }

    async fn attempt(
        &self,
        persona: &EvaluatedPersona,
        model: &str,
        provider_kind: crate::provider::ProviderKind,
    ) -> Result<PersonaCore> {
        let request = GenerationRequest::new(model, refine_prompt(persona))
            .with_system_prompt(REFINE_SYSTEM_PROMPT)
            .with_temperature(self.config.refine_temperature)
            .with_max_tokens(2048);

        let response = self.provider.generate(request.clone()).await?;
        self.tracker.record(
            CostStage::FrontierRefine,
            provider_kind,
            model,
            response.usage_or_estimate(&request),
        );

        parse_refined(&response.text, persona)
    }
}

fn refine_prompt(persona: &EvaluatedPersona) -> String {
    let feedback = match &persona.evaluation {
        EvaluationOutcome::Scored(result) => {
            let mut lines = vec![format!("Overall score: {:.2}", result.overall_score)];
            for score in &result.criterion_scores {
                match &score.reasoning {
                    Some(reasoning) => {
                        lines.push(format!("- {}: {:.2} ({})", score.criterion, score.score, reasoning))
                    }
                    None => lines.push(format!("- {}: {:.2}", score.criterion, score.score)),
                }
            }
            if let Some(feedback) = &result.feedback {
                lines.push(format!("Feedback: {}", feedback));
            }
            lines.join("\n")
        }
        EvaluationOutcome::Failed { error } => {
            format!("The persona could not be evaluated ({}); rewrite it to be coherent, realistic and specific.", error)
        }
        EvaluationOutcome::Skipped => "No evaluation available; improve overall quality.".to_string(),
    };

    format!(
        "Rewrite the following persona to address the review feedback while keeping \
         what already works. Keep the same general identity.\n\n\
         Persona:\n{}\n\n\
         Review:\n{}\n\n\
         Reply with a single JSON object for the improved persona, including \"name\".",
        persona.core.to_prompt_json(),
        feedback,
    )
}

fn parse_refined(text: &str, original: &EvaluatedPersona) -> Result<PersonaCore> {
    let json = extract_json(text, '{', '}').ok_or_else(|| {
        Error::refinement_failed(&original.core.id, "Refinement reply contains no JSON object")
    })?;
    let Value::Object(mut map) = serde_json::from_str::<Value>(json).map_err(|e| {
        Error::refinement_failed(
            &original.core.id,
            format!("Refinement reply is not valid JSON: {}", e),
        )
    })?
    else {
        return Err(Error::refinement_failed(
            &original.core.id,
            "Refinement reply is not a JSON object",
        ));
    };

    let name = match map.remove("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => name,
        // Tolerate a dropped name; keep the original identity
        _ => original.core.name.clone(),
    };

    let mut core = PersonaCore::new(
        name,
        original.core.batch_index,
        original.core.generation_order,
    );
    core.fields = map.into_iter().collect();
    Ok(core)
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::judge::EvaluationResult;
    use crate::provider::{MockProvider, ProviderKind};
    use crate::types::TokenUsage;

    fn rejected(name: &str) -> EvaluatedPersona {
        EvaluatedPersona {
            core: PersonaCore::new(name, 0, 0),
            evaluation: EvaluationOutcome::Scored(EvaluationResult::overall_only(0.4)),
        }
    }

    fn hybrid_config() -> HybridConfig {
        HybridConfig::builder()
            .frontier(ProviderKind::OpenAi, "gpt-4o")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_successful_refinement_keeps_lineage() {
        let mock = Arc::new(MockProvider::new());
        mock.push_response("{\"name\": \"Maya (v2)\", \"occupation\": \"charge nurse\"}");

        let config = hybrid_config();
        let tracker = CostTracker::new();
        let stage = RefineStage::new(mock, &config, &tracker);

        let persona = rejected("Maya");
        let original_id = persona.core.id.clone();
        let records = stage.run(vec![persona]).await;

        assert_eq!(records.len(), 1);
        let PersonaRecord::Refined(refined) = &records[0] else {
            panic!("expected refined record");
        };
        assert!(refined.is_refined());
        assert_eq!(refined.refined_from, original_id);
        assert_ne!(refined.core.id, original_id);
        assert_eq!(refined.core.name, "Maya (v2)");
        assert_eq!(refined.attempts, 1);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let mock = Arc::new(MockProvider::new());
        mock.push_response("not json");
        mock.push_response("{\"name\": \"Maya (v2)\"}");

        let config = hybrid_config();
        let tracker = CostTracker::new();
        let stage = RefineStage::new(mock.clone(), &config, &tracker);

        let records = stage.run(vec![rejected("Maya")]).await;
        let PersonaRecord::Refined(refined) = &records[0] else {
            panic!("expected refined record");
        };
        assert!(refined.is_refined());
        assert_eq!(refined.attempts, 2);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_all_attempts_fail_keeps_draft_content() {
        let mock = Arc::new(MockProvider::new());
        mock.push_failure("rate limited");
        mock.push_failure("rate limited");

        let config = hybrid_config();
        let tracker = CostTracker::new();
        let stage = RefineStage::new(mock.clone(), &config, &tracker);

        let records = stage.run(vec![rejected("Maya")]).await;
        let PersonaRecord::Refined(refined) = &records[0] else {
            panic!("expected refined record");
        };
        assert!(!refined.is_refined());
        assert_eq!(refined.core.name, "Maya");
        assert_eq!(refined.attempts, 2);
        assert!(refined.refinement_error.as_deref().unwrap().contains("rate limited"));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_budget_stops_remaining_refinements() {
        let mock = Arc::new(MockProvider::new());
        // First refinement burns well past the budget: 1M in + 1M out on
        // gpt-4o is $12.50
        mock.push_usage_response(
            "{\"name\": \"A (v2)\"}",
            TokenUsage::new(1_000_000, 1_000_000),
        );

        let config = HybridConfig::builder()
            .frontier(ProviderKind::OpenAi, "gpt-4o")
            .max_cost(1.0)
            .build()
            .unwrap();
        let tracker = CostTracker::new();
        let stage = RefineStage::new(mock.clone(), &config, &tracker);

        let records = stage.run(vec![rejected("A"), rejected("B"), rejected("C")]).await;
        assert_eq!(records.len(), 3);
        assert!(records[0].is_refined());
        // B and C skipped after the budget hit, still present and evaluated
        assert!(matches!(records[1], PersonaRecord::Evaluated(_)));
        assert!(matches!(records[2], PersonaRecord::Evaluated(_)));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_budget_already_spent_refines_nothing() {
        let mock = Arc::new(MockProvider::new());
        let config = HybridConfig::builder()
            .frontier(ProviderKind::OpenAi, "gpt-4o")
            .max_cost(1.0)
            .build()
            .unwrap();
        let tracker = CostTracker::new();
        // Judge stage already consumed the budget
        tracker.record(
            CostStage::Judge,
            ProviderKind::OpenAi,
            "gpt-4o",
            TokenUsage::new(1_000_000, 0),
        );

        let stage = RefineStage::new(mock.clone(), &config, &tracker);
        let records = stage.run(vec![rejected("A")]).await;
        assert!(matches!(records[0], PersonaRecord::Evaluated(_)));
        assert_eq!(mock.call_count(), 0);
    }
}
