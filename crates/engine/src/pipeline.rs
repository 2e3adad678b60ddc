//! Pipeline compositions used by the commands: match-only, file-enrich and
//! bulk-by-id.

use serde_json::{json, Value};

use crate::aggregate::{merge, Aggregated, OutputMode, RowOutcome};
use crate::batch::{self, Enricher};
use crate::context::RunContext;
use crate::error::{NormalizeError, PipelineError};
use crate::model::{EnrichmentItem, EnrichmentRequest, EntityKind, MatchOutcome, RawRow};
use crate::normalize::normalize;
use crate::resolver::{self, Matcher};
use crate::rows::ExtractedIds;

/// Normalize + resolve result for one input row.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Unrecognized(NormalizeError),
    Outcome(MatchOutcome),
}

impl Resolution {
    pub fn resolved(&self) -> Option<(&str, f64)> {
        match self {
            Self::Outcome(MatchOutcome::Resolved { id, confidence }) => Some((id, *confidence)),
            _ => None,
        }
    }

    /// Outcome for rows that did not resolve: unmatched or errored.
    fn failure(&self) -> Option<RowOutcome> {
        let unmatched = |reason: String| Some(RowOutcome::Unmatched { reason });
        match self {
            Self::Unrecognized(e) => unmatched(e.to_string()),
            Self::Outcome(MatchOutcome::Resolved { .. }) => None,
            Self::Outcome(MatchOutcome::NoCandidates) => unmatched("no match found".to_string()),
            Self::Outcome(MatchOutcome::BelowThreshold { candidates }) => {
                let best = candidates.first().map(|c| c.confidence).unwrap_or(0.0);
                unmatched(format!("low confidence match ({best:.2})"))
            }
            Self::Outcome(MatchOutcome::InvalidDescriptor { reason }) => unmatched(reason.clone()),
            Self::Outcome(MatchOutcome::Failed { reason }) => {
                Some(RowOutcome::Errored { reason: reason.clone() })
            }
        }
    }
}

/// Normalize every row and resolve the recognizable ones.
pub fn resolve_rows(
    matcher: &dyn Matcher,
    rows: &[RawRow],
    kind: EntityKind,
    threshold: f64,
    ctx: &RunContext,
) -> Result<Vec<Resolution>, PipelineError> {
    let normalized = normalize(rows, kind);

    let descriptors: Vec<_> = normalized.iter().filter_map(|r| r.as_ref().ok().cloned()).collect();
    let outcomes = resolver::resolve(matcher, &descriptors, threshold, ctx)?;
    let mut outcomes = outcomes.into_iter();

    Ok(normalized
        .into_iter()
        .map(|r| match r {
            Err(e) => Resolution::Unrecognized(e),
            Ok(_) => Resolution::Outcome(outcomes.next().unwrap_or(MatchOutcome::NoCandidates)),
        })
        .collect())
}

/// Match-only: each matched row carries its ID, confidence and input columns.
pub fn match_rows(
    matcher: &dyn Matcher,
    rows: &[RawRow],
    kind: EntityKind,
    threshold: f64,
    ctx: &RunContext,
) -> Result<Aggregated, PipelineError> {
    let resolutions = resolve_rows(matcher, rows, kind, threshold, ctx)?;
    let outcomes: Vec<RowOutcome> = resolutions
        .iter()
        .map(|r| match r.resolved() {
            Some((id, confidence)) => {
                let mut payload = crate::model::Payload::new();
                payload.insert("match_confidence".to_string(), json!(confidence));
                RowOutcome::Enriched { id: id.to_string(), payload }
            }
            None => r.failure().unwrap_or(RowOutcome::Unmatched { reason: String::new() }),
        })
        .collect();
    Ok(merge(&outcomes, rows, OutputMode::FileEnrich, kind.id_field()))
}

/// What to enrich with and how to shape the output.
#[derive(Debug, Clone, Copy)]
pub struct EnrichPlan<'a> {
    pub types: &'a [String],
    pub chunk_size: usize,
    pub mode: OutputMode,
}

/// Resolve rows, then enrich the resolved IDs.
pub fn enrich_rows(
    matcher: &dyn Matcher,
    enricher: &dyn Enricher,
    rows: &[RawRow],
    kind: EntityKind,
    threshold: f64,
    plan: EnrichPlan<'_>,
    ctx: &RunContext,
) -> Result<Aggregated, PipelineError> {
    let resolutions = resolve_rows(matcher, rows, kind, threshold, ctx)?;

    let mut outcomes: Vec<Option<RowOutcome>> = resolutions.iter().map(Resolution::failure).collect();
    let requests: Vec<EnrichmentRequest> = resolutions
        .iter()
        .enumerate()
        .filter_map(|(i, r)| {
            r.resolved().map(|(id, _)| EnrichmentRequest { source_index: i, id: id.to_string() })
        })
        .collect();

    let items = batch::run(enricher, &requests, plan.types, plan.chunk_size, ctx)?;
    place_items(&mut outcomes, items);

    Ok(merge(&finish(outcomes), rows, plan.mode, kind.id_field()))
}

/// Enrich IDs the caller already has. `input_rows` may be empty when the IDs
/// came from a flag rather than a file.
pub fn enrich_ids(
    enricher: &dyn Enricher,
    ids: &ExtractedIds,
    input_rows: &[RawRow],
    kind: EntityKind,
    plan: EnrichPlan<'_>,
    ctx: &RunContext,
) -> Result<Aggregated, PipelineError> {
    let mut outcomes: Vec<Option<RowOutcome>> = vec![None; ids.total_rows];
    for &i in &ids.blank_rows {
        if let Some(slot) = outcomes.get_mut(i) {
            *slot = Some(RowOutcome::Unmatched {
                reason: format!("missing {}", kind.id_field()),
            });
        }
    }

    let items = batch::run(enricher, &ids.requests, plan.types, plan.chunk_size, ctx)?;
    place_items(&mut outcomes, items);

    Ok(merge(&finish(outcomes), input_rows, plan.mode, kind.id_field()))
}

fn place_items(outcomes: &mut [Option<RowOutcome>], items: Vec<EnrichmentItem>) {
    for item in items {
        let outcome = match item.result {
            Ok(payload) => RowOutcome::Enriched { id: item.id, payload },
            Err(e) => RowOutcome::Errored { reason: e.to_string() },
        };
        if let Some(slot) = outcomes.get_mut(item.source_index) {
            *slot = Some(outcome);
        }
    }
}

fn finish(outcomes: Vec<Option<RowOutcome>>) -> Vec<RowOutcome> {
    outcomes
        .into_iter()
        .map(|o| {
            o.unwrap_or(RowOutcome::Errored {
                reason: "no result produced".to_string(),
            })
        })
        .collect()
}

/// `_match_meta` block for command output.
pub fn match_meta(agg: &Aggregated) -> Value {
    json!({
        "total_input": agg.summary.total_input,
        "matched": agg.summary.matched,
        "not_found": agg.summary.unmatched,
        "errors": agg.summary.errored,
    })
}
