//! Hybrid generation pipeline
//!
//! Three stages: a cheap local model drafts personas, an LLM judge filters
//! them against a quality threshold, and a frontier model refines only the
//! drafts that fell short. Cost is tracked per stage and refinement stops
//! early when a dollar budget would be exceeded.

mod config;
mod cost;
mod draft;
mod filter;
mod refine;
mod runner;

pub use config::HybridConfig;
pub use runner::HybridPipeline;
