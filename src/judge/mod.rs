//! LLM-as-judge quality evaluation
//!
//! The judge scores generated personas against fixed criteria. It is used
//! by the pipeline's filter stage and is also exposed standalone through
//! the `evaluate` CLI command.

mod criteria;
#[allow(clippy::module_inception)]
mod judge;

pub use criteria::{EvaluationCriterion, EvaluationResult};
pub use judge::PersonaJudge;

pub(crate) use judge::extract_json;
