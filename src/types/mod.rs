//! Core data types for the persona pipeline

mod persona;
mod usage;

pub use persona::{
    DraftPersona, EvaluatedPersona, EvaluationOutcome, PersonaCore, PersonaRecord, RefinedPersona,
};
pub use usage::TokenUsage;
