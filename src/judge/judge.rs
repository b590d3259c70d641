//! LLM-as-judge evaluation calls
//!
//! Sends a persona (or a whole batch) to the judge model at temperature 0
//! and parses a structured JSON verdict out of the reply. Transport errors
//! surface as provider errors; a reply the judge produced but we cannot
//! parse is a malformed-verdict error and is never retried, since at
//! temperature 0 a retry would get the same reply back.

use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::judge::criteria::{CriterionScore, EvaluationCriterion, EvaluationResult};
use crate::provider::{GenerationRequest, SharedProvider};
use crate::types::{PersonaCore, TokenUsage};

// ─────────────────────────────────────────────────────────────────
// Wire Format
// ─────────────────────────────────────────────────────────────────

/// The JSON shape the judge model is instructed to reply with
#[derive(Debug, Deserialize)]
struct RawVerdict {
    overall_score: f64,
    #[serde(default)]
    scores: Vec<RawCriterionScore>,
    #[serde(default)]
    feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCriterionScore {
    criterion: String,
    score: f64,
    #[serde(default)]
    reasoning: Option<String>,
}

// ─────────────────────────────────────────────────────────────────
// Judge
// ─────────────────────────────────────────────────────────────────

/// Scores personas against fixed criteria using a provider as the judge
pub struct PersonaJudge {
    provider: SharedProvider,
    model: String,
    temperature: f32,
}

impl PersonaJudge {
    /// Create a judge with the deterministic default temperature (0.0)
    pub fn new(provider: SharedProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
        }
    }

    /// Override the judging temperature (tests only; verdicts should be
    /// deterministic in production)
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Score one persona against the given criteria.
    ///
    /// Rejects batch-level criteria (distinctiveness) since they cannot be
    /// judged on a persona in isolation; use [`evaluate_batch`] for those.
    ///
    /// [`evaluate_batch`]: PersonaJudge::evaluate_batch
    pub async fn evaluate(
        &self,
        persona: &PersonaCore,
        criteria: &[EvaluationCriterion],
    ) -> Result<(EvaluationResult, TokenUsage)> {
        match self.evaluate_with_usage(persona, criteria).await {
            (Ok(result), usage) => Ok((result, usage)),
            (Err(e), _) => Err(e),
        }
    }

    /// Like [`evaluate`], but reports token usage separately from the
    /// verdict. A malformed verdict still billed the tokens the judge
    /// model consumed producing it, so callers that meter cost get that
    /// usage back alongside the error; usage is zero only when no reply
    /// ever arrived.
    ///
    /// [`evaluate`]: PersonaJudge::evaluate
    #[instrument(skip(self, persona, criteria), fields(persona_id = %persona.id))]
    pub async fn evaluate_with_usage(
        &self,
        persona: &PersonaCore,
        criteria: &[EvaluationCriterion],
    ) -> (Result<EvaluationResult>, TokenUsage) {
        if let Some(batch_only) = criteria.iter().find(|c| c.requires_batch()) {
            return (
                Err(Error::NotSupported(format!(
                    "Criterion '{}' compares personas within a batch and cannot be scored per-persona",
                    batch_only
                ))),
                TokenUsage::default(),
            );
        }

        let request = GenerationRequest::new(&self.model, single_prompt(persona, criteria))
            .with_system_prompt(SYSTEM_PROMPT)
            .with_temperature(self.temperature)
            .with_max_tokens(1024);

        let response = match self.provider.generate(request.clone()).await {
            Ok(response) => response,
            Err(e) => return (Err(e), TokenUsage::default()),
        };
        let usage = response.usage_or_estimate(&request);

        let result = parse_verdict(&response.text).map(|verdict| {
            debug!(score = verdict.overall_score, "Judge verdict parsed");
            into_result(verdict, criteria)
        });
        (result, usage)
    }

    /// Score every persona in a batch with a single judge call.
    ///
    /// Required for batch-level criteria like distinctiveness. The judge
    /// must return exactly one verdict per persona, in order; a length
    /// mismatch is a malformed verdict.
    #[instrument(skip(self, personas, criteria), fields(batch_size = personas.len()))]
    pub async fn evaluate_batch(
        &self,
        personas: &[PersonaCore],
        criteria: &[EvaluationCriterion],
    ) -> Result<(Vec<EvaluationResult>, TokenUsage)> {
        if personas.is_empty() {
            return Ok((Vec::new(), TokenUsage::new(0, 0)));
        }

        let request = GenerationRequest::new(&self.model, batch_prompt(personas, criteria))
            .with_system_prompt(SYSTEM_PROMPT)
            .with_temperature(self.temperature)
            .with_max_tokens(4096);

        let response = self.provider.generate(request.clone()).await?;
        let usage = response.usage_or_estimate(&request);

        let json = extract_json(&response.text, '[', ']').ok_or_else(|| Error::JudgeMalformed {
            message: "No JSON array found in judge reply".to_string(),
        })?;
        let raw: Vec<RawVerdict> =
            serde_json::from_str(json).map_err(|e| Error::JudgeMalformed {
                message: format!("Judge reply is not a valid verdict array: {}", e),
            })?;

        if raw.len() != personas.len() {
            return Err(Error::JudgeMalformed {
                message: format!(
                    "Judge returned {} verdicts for {} personas",
                    raw.len(),
                    personas.len()
                ),
            });
        }

        let results = raw
            .into_iter()
            .map(|verdict| into_result(verdict, criteria))
            .collect();
        Ok((results, usage))
    }
}

// ─────────────────────────────────────────────────────────────────
// Prompts
// ─────────────────────────────────────────────────────────────────

const SYSTEM_PROMPT: &str = "You are a strict evaluator of user-research personas. \
You reply with JSON only, no prose before or after.";

fn criteria_block(criteria: &[EvaluationCriterion]) -> String {
    criteria
        .iter()
        .map(|c| format!("- {}: {}", c.name(), c.description()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn single_prompt(persona: &PersonaCore, criteria: &[EvaluationCriterion]) -> String {
    format!(
        "Evaluate the following persona against each criterion, scoring 0.0 to 1.0.\n\n\
         Criteria:\n{}\n\n\
         Persona:\n{}\n\n\
         Reply with a single JSON object:\n\
         {{\"overall_score\": <0.0-1.0>, \"scores\": [{{\"criterion\": \"<name>\", \
         \"score\": <0.0-1.0>, \"reasoning\": \"<one sentence>\"}}], \
         \"feedback\": \"<one sentence of actionable feedback>\"}}",
        criteria_block(criteria),
        persona.to_prompt_json(),
    )
}

fn batch_prompt(personas: &[PersonaCore], criteria: &[EvaluationCriterion]) -> String {
    let listing = personas
        .iter()
        .enumerate()
        .map(|(i, p)| format!("Persona {}:\n{}", i + 1, p.to_prompt_json()))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Evaluate each of the following {count} personas against each criterion, \
         scoring 0.0 to 1.0. Criteria that compare personas (such as distinctiveness) \
         must be judged relative to the other personas listed here.\n\n\
         Criteria:\n{criteria}\n\n\
         {listing}\n\n\
         Reply with a JSON array of exactly {count} objects, one per persona in order:\n\
         [{{\"overall_score\": <0.0-1.0>, \"scores\": [{{\"criterion\": \"<name>\", \
         \"score\": <0.0-1.0>, \"reasoning\": \"<one sentence>\"}}], \
         \"feedback\": \"<one sentence>\"}}]",
        count = personas.len(),
        criteria = criteria_block(criteria),
        listing = listing,
    )
}

// ─────────────────────────────────────────────────────────────────
// Verdict Parsing
// ─────────────────────────────────────────────────────────────────

/// Extract the first balanced `open`..`close` region from text.
///
/// Judge models sometimes wrap JSON in markdown fences or add a lead-in
/// sentence despite instructions; this tolerates both.
pub(crate) fn extract_json(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_verdict(text: &str) -> Result<RawVerdict> {
    let json = extract_json(text, '{', '}').ok_or_else(|| Error::JudgeMalformed {
        message: "No JSON object found in judge reply".to_string(),
    })?;
    serde_json::from_str(json).map_err(|e| Error::JudgeMalformed {
        message: format!("Judge reply is not a valid verdict: {}", e),
    })
}

fn into_result(raw: RawVerdict, requested: &[EvaluationCriterion]) -> EvaluationResult {
    let criterion_scores = raw
        .scores
        .into_iter()
        .filter_map(|s| match s.criterion.parse::<EvaluationCriterion>() {
            Ok(criterion) if requested.contains(&criterion) => Some(CriterionScore {
                criterion,
                score: s.score.clamp(0.0, 1.0),
                reasoning: s.reasoning,
            }),
            _ => {
                warn!(criterion = %s.criterion, "Judge scored an unrequested criterion; dropping");
                None
            }
        })
        .collect();

    EvaluationResult {
        overall_score: raw.overall_score.clamp(0.0, 1.0),
        criterion_scores,
        feedback: raw.feedback,
        judged_at: chrono::Utc::now(),
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
