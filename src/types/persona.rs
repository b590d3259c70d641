//! Persona record types, tagged by pipeline stage.
//!
//! A persona moves through three stages: it is drafted by the local model,
//! annotated by the judge, and optionally replaced by a frontier-model
//! rewrite. Each stage's type is a strict superset of the previous one, so
//! stage-order bugs fail at compile time instead of at run time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::judge::EvaluationResult;

// ─────────────────────────────────────────────────────────────────
// Persona Core
// ─────────────────────────────────────────────────────────────────

/// The persona content shared by every stage.
///
/// `fields` is an open mapping (occupation, goals, pain points, quotes, ...);
/// only `id` and `name` are required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaCore {
    /// Unique persona identifier
    pub id: String,

    /// Persona display name
    pub name: String,

    /// Remaining persona attributes, schema-flexible
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,

    /// Which draft batch produced this persona
    pub batch_index: usize,

    /// Position within the overall draft order
    pub generation_order: usize,
}

impl PersonaCore {
    /// Create a new persona core with a fresh identifier.
    pub fn new(name: impl Into<String>, batch_index: usize, generation_order: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            fields: BTreeMap::new(),
            batch_index,
            generation_order,
        }
    }

    /// Render the persona as a compact JSON object for prompt embedding.
    pub fn to_prompt_json(&self) -> String {
        let mut map = serde_json::Map::new();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        for (k, v) in &self.fields {
            map.insert(k.clone(), v.clone());
        }
        Value::Object(map).to_string()
    }
}

// ─────────────────────────────────────────────────────────────────
// Evaluation Outcome
// ─────────────────────────────────────────────────────────────────

/// What the filter stage decided about a persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    /// The judge produced a verdict
    Scored(EvaluationResult),

    /// The judge call failed; routed conservatively to needs-refinement
    Failed { error: String },

    /// Local-only run: the judge was never invoked and the persona passed
    Skipped,
}

impl EvaluationOutcome {
    /// Whether this outcome clears the quality threshold.
    ///
    /// Failed evaluations never pass; skipped evaluations always do (the
    /// local-only short-circuit is a cost decision, not a quality one).
    pub fn passes(&self, threshold: f64) -> bool {
        match self {
            EvaluationOutcome::Scored(result) => result.overall_score >= threshold,
            EvaluationOutcome::Failed { .. } => false,
            EvaluationOutcome::Skipped => true,
        }
    }

    /// The judge's overall score, if one exists.
    pub fn score(&self) -> Option<f64> {
        match self {
            EvaluationOutcome::Scored(result) => Some(result.overall_score),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Stage-Tagged Records
// ─────────────────────────────────────────────────────────────────

/// A persona as produced by the draft stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftPersona {
    pub core: PersonaCore,
}

/// A persona after the filter stage has attached an evaluation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatedPersona {
    pub core: PersonaCore,
    pub evaluation: EvaluationOutcome,
}

/// A persona that went through the refine stage.
///
/// On success `core` holds the frontier rewrite and `refinement_error` is
/// `None`; on failure the original content is kept and the error recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinedPersona {
    pub core: PersonaCore,
    pub evaluation: EvaluationOutcome,

    /// Identifier of the draft this refinement traces back to
    pub refined_from: String,

    /// How many frontier attempts were made
    pub attempts: u32,

    /// Set when every refinement attempt failed; content is then unmodified
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refinement_error: Option<String>,
}

impl RefinedPersona {
    /// Whether the frontier model actually replaced the content.
    pub fn is_refined(&self) -> bool {
        self.refinement_error.is_none()
    }
}

impl DraftPersona {
    /// Attach an evaluation outcome, moving to the evaluated stage.
    pub fn evaluated(self, evaluation: EvaluationOutcome) -> EvaluatedPersona {
        EvaluatedPersona {
            core: self.core,
            evaluation,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Unified Record
// ─────────────────────────────────────────────────────────────────

/// A persona at any pipeline stage, tagged for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum PersonaRecord {
    Draft(DraftPersona),
    Evaluated(EvaluatedPersona),
    Refined(RefinedPersona),
}

impl PersonaRecord {
    /// The persona content regardless of stage.
    pub fn core(&self) -> &PersonaCore {
        match self {
            PersonaRecord::Draft(p) => &p.core,
            PersonaRecord::Evaluated(p) => &p.core,
            PersonaRecord::Refined(p) => &p.core,
        }
    }

    /// The persona identifier.
    pub fn id(&self) -> &str {
        &self.core().id
    }

    /// Stage name for display and logging.
    pub fn stage_name(&self) -> &'static str {
        match self {
            PersonaRecord::Draft(_) => "draft",
            PersonaRecord::Evaluated(_) => "evaluated",
            PersonaRecord::Refined(_) => "refined",
        }
    }

    /// The evaluation outcome, if the persona got past the draft stage.
    pub fn evaluation(&self) -> Option<&EvaluationOutcome> {
        match self {
            PersonaRecord::Draft(_) => None,
            PersonaRecord::Evaluated(p) => Some(&p.evaluation),
            PersonaRecord::Refined(p) => Some(&p.evaluation),
        }
    }

    /// Whether this record is a successful frontier refinement.
    pub fn is_refined(&self) -> bool {
        matches!(self, PersonaRecord::Refined(p) if p.is_refined())
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
