//! Draft stage: cheap local generation
//!
//! Asks the local model for personas in batches, one JSON array per call.
//! Drafting is the foundation the later stages build on, so a failed draft
//! call aborts the run instead of being papered over.

use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::judge::extract_json;
use crate::loader::SourceData;
use crate::pipeline::config::HybridConfig;
use crate::pipeline::cost::{CostStage, CostTracker};
use crate::provider::{GenerationRequest, SharedProvider};
use crate::types::{DraftPersona, PersonaCore};

/// Cap on how much source text is embedded into a draft prompt
const SOURCE_EXCERPT_CHARS: usize = 6000;

const DRAFT_SYSTEM_PROMPT: &str = "You generate user-research personas from raw research data. \
You reply with JSON only, no prose before or after.";

// ─────────────────────────────────────────────────────────────────
// Draft Stage
// ─────────────────────────────────────────────────────────────────

pub(crate) struct DraftStage<'a> {
    provider: SharedProvider,
    config: &'a HybridConfig,
    tracker: &'a CostTracker,
}

impl<'a> DraftStage<'a> {
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

    /// Draft `count` personas in batches of `config.batch_size`
    #[instrument(skip(self, source), fields(count))]
    pub(crate) async fn run(&self, source: &SourceData, count: usize) -> Result<Vec<DraftPersona>> {
        let excerpt = source.excerpt(SOURCE_EXCERPT_CHARS);
        let mut drafts = Vec::with_capacity(count);
        let mut batch_index = 0usize;

        while drafts.len() < count {
            let remaining = count - drafts.len();
            let batch_count = remaining.min(self.config.batch_size);
            let batch = self.draft_batch(&excerpt, batch_count, batch_index, drafts.len()).await?;
            debug!(batch_index, produced = batch.len(), "Draft batch complete");
            drafts.extend(batch);
            batch_index += 1;
        }

        // A batch can overshoot if the model ignores the requested count
        drafts.truncate(count);
        info!(drafted = drafts.len(), batches = batch_index, "Draft stage complete");
        Ok(drafts)
    }

    async fn draft_batch(
        &self,
        excerpt: &str,
        batch_count: usize,
        batch_index: usize,
        order_offset: usize,
    ) -> Result<Vec<DraftPersona>> {
        let request = GenerationRequest::new(
            &self.config.local_model,
            draft_prompt(excerpt, batch_count),
        )
        .with_system_prompt(DRAFT_SYSTEM_PROMPT)
        .with_temperature(self.config.draft_temperature)
        .with_max_tokens(4096);

        let response = self.provider.generate(request.clone()).await?;
        self.tracker.record(
            CostStage::LocalDraft,
            self.config.local_provider,
            &self.config.local_model,
            response.usage_or_estimate(&request),
        );

        parse_batch(&response.text, batch_index, order_offset)
    }
}

fn draft_prompt(excerpt: &str, batch_count: usize) -> String {
    format!(
        "Based on the research data below, generate {count} distinct user personas. \
         Each persona needs a \"name\" plus whatever attributes the data supports \
         (occupation, age, goals, pain_points, behaviors, quote, ...). Make the \
         personas different from each other.\n\n\
         Research data:\n{excerpt}\n\n\
         Reply with a JSON array of exactly {count} persona objects.",
        count = batch_count,
        excerpt = excerpt,
    )
}

/// Parse a draft reply into personas.
///
/// Every persona object must carry a non-empty name; anything else about
/// the reply we cannot salvage is a generation failure.
fn parse_batch(text: &str, batch_index: usize, order_offset: usize) -> Result<Vec<DraftPersona>> {
    let json = extract_json(text, '[', ']')
        .ok_or_else(|| Error::generation("Draft reply contains no JSON array"))?;
    let items: Vec<Value> = serde_json::from_str(json)
        .map_err(|e| Error::generation(format!("Draft reply is not a valid JSON array: {}", e)))?;

    if items.is_empty() {
        return Err(Error::generation("Draft reply contains an empty array"));
    }

    let mut drafts = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        let Value::Object(mut map) = item else {
            return Err(Error::generation(format!(
                "Draft persona {} is not a JSON object",
                i + 1
            )));
        };

        let name = match map.remove("name") {
            Some(Value::String(name)) if !name.trim().is_empty() => name,
            _ => {
                return Err(Error::generation(format!(
                    "Draft persona {} is missing a name",
                    i + 1
                )))
            }
        };

        let mut core = PersonaCore::new(name, batch_index, order_offset + i);
        core.fields = map.into_iter().collect();
        drafts.push(DraftPersona { core });
    }

    Ok(drafts)
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
