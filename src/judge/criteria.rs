//! Evaluation criteria and verdict types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

// ─────────────────────────────────────────────────────────────────
// Criteria
// ─────────────────────────────────────────────────────────────────

/// Quality criteria a persona can be scored on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationCriterion {
    /// Internally consistent: attributes, goals and behaviours fit together
    Coherence,
    /// Plausible as an actual person, not a caricature
    Realism,
    /// Actionable for product and design decisions
    Usefulness,
    /// Distinguishable from the other personas in the batch
    Distinctiveness,
    /// Covers the expected persona dimensions
    Completeness,
    /// Concrete details rather than generic filler
    Specificity,
}

impl EvaluationCriterion {
    /// All criteria
    pub fn all() -> &'static [EvaluationCriterion] {
        &[
            EvaluationCriterion::Coherence,
            EvaluationCriterion::Realism,
            EvaluationCriterion::Usefulness,
            EvaluationCriterion::Distinctiveness,
            EvaluationCriterion::Completeness,
            EvaluationCriterion::Specificity,
        ]
    }

    /// The canonical default set used by the pipeline's filter stage
    pub fn default_set() -> &'static [EvaluationCriterion] {
        &[
            EvaluationCriterion::Coherence,
            EvaluationCriterion::Realism,
            EvaluationCriterion::Usefulness,
        ]
    }

    /// Name used in prompts, CLI args and verdict JSON
    pub fn name(&self) -> &'static str {
        match self {
            EvaluationCriterion::Coherence => "coherence",
            EvaluationCriterion::Realism => "realism",
            EvaluationCriterion::Usefulness => "usefulness",
            EvaluationCriterion::Distinctiveness => "distinctiveness",
            EvaluationCriterion::Completeness => "completeness",
            EvaluationCriterion::Specificity => "specificity",
        }
    }

    /// Fixed description handed to the judge model
    pub fn description(&self) -> &'static str {
        match self {
            EvaluationCriterion::Coherence => {
                "The persona's attributes, goals, pain points and behaviours form a consistent whole with no contradictions."
            }
            EvaluationCriterion::Realism => {
                "The persona reads like a plausible real person grounded in the research data, not a stereotype or caricature."
            }
            EvaluationCriterion::Usefulness => {
                "The persona gives a product team actionable insight: concrete goals, frustrations and contexts of use."
            }
            EvaluationCriterion::Distinctiveness => {
                "The persona is clearly distinguishable from every other persona in the batch in role, goals and behaviour."
            }
            EvaluationCriterion::Completeness => {
                "The persona covers the expected dimensions: background, goals, pain points, behaviours and representative quotes."
            }
            EvaluationCriterion::Specificity => {
                "The persona contains concrete, specific details rather than generic statements that could apply to anyone."
            }
        }
    }

    /// Whether scoring this criterion requires seeing the whole batch.
    ///
    /// Distinctiveness compares personas against each other; all other
    /// criteria score a persona in isolation.
    pub fn requires_batch(&self) -> bool {
        matches!(self, EvaluationCriterion::Distinctiveness)
    }
}

impl fmt::Display for EvaluationCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for EvaluationCriterion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "coherence" => Ok(EvaluationCriterion::Coherence),
            "realism" => Ok(EvaluationCriterion::Realism),
            "usefulness" => Ok(EvaluationCriterion::Usefulness),
            "distinctiveness" => Ok(EvaluationCriterion::Distinctiveness),
            "completeness" => Ok(EvaluationCriterion::Completeness),
            "specificity" => Ok(EvaluationCriterion::Specificity),
            _ => Err(Error::config_field_invalid(
                "criteria",
                format!(
                    "Unknown criterion '{}'. Valid: coherence, realism, usefulness, distinctiveness, completeness, specificity",
                    s
                ),
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Verdicts
// ─────────────────────────────────────────────────────────────────

/// Per-criterion score with the judge's reasoning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion: EvaluationCriterion,

    /// Score in [0, 1]
    pub score: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// One judge's verdict on one persona. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Overall score in [0, 1]
    pub overall_score: f64,

    /// Per-criterion breakdown, possibly empty
    #[serde(default)]
    pub criterion_scores: Vec<CriterionScore>,

    /// Free-text feedback from the judge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,

    /// When the verdict was produced
    pub judged_at: DateTime<Utc>,
}

impl EvaluationResult {
    /// Construct a verdict carrying only an overall score
    pub fn overall_only(overall_score: f64) -> Self {
        Self {
            overall_score,
            criterion_scores: Vec::new(),
            feedback: None,
            judged_at: Utc::now(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_set() {
        let defaults = EvaluationCriterion::default_set();
        assert_eq!(defaults.len(), 3);
        assert!(defaults.contains(&EvaluationCriterion::Coherence));
        assert!(defaults.contains(&EvaluationCriterion::Realism));
        assert!(defaults.contains(&EvaluationCriterion::Usefulness));
    }

    #[test]
    fn test_only_distinctiveness_requires_batch() {
        for criterion in EvaluationCriterion::all() {
            assert_eq!(
                criterion.requires_batch(),
                *criterion == EvaluationCriterion::Distinctiveness
            );
        }
    }

    #[test]
    fn test_from_str() {
        assert_eq!(
            "coherence".parse::<EvaluationCriterion>().unwrap(),
            EvaluationCriterion::Coherence
        );
        assert_eq!(
            "REALISM".parse::<EvaluationCriterion>().unwrap(),
            EvaluationCriterion::Realism
        );
        assert!("quality".parse::<EvaluationCriterion>().is_err());
    }

    #[test]
    fn test_descriptions_nonempty() {
        for criterion in EvaluationCriterion::all() {
            assert!(!criterion.description().is_empty());
        }
    }

    #[test]
    fn test_serde_roundtrip() {
        let json = serde_json::to_string(&EvaluationCriterion::Distinctiveness).unwrap();
        assert_eq!(json, "\"distinctiveness\"");
        let parsed: EvaluationCriterion = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, EvaluationCriterion::Distinctiveness);
    }

    #[test]
    fn test_overall_only() {
        let result = EvaluationResult::overall_only(0.75);
        assert_eq!(result.overall_score, 0.75);
        assert!(result.criterion_scores.is_empty());
        assert!(result.feedback.is_none());
    }
}
