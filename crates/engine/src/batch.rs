//! Batch executor: chunked bulk-enrich dispatch with per-item failure
//! isolation.

use std::collections::HashMap;
use std::ops::Range;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::context::RunContext;
use crate::error::{PipelineError, RemoteError};
use crate::model::{EnrichmentItem, EnrichmentRequest, ItemError, Payload};
use crate::retry::RetryFailure;

pub const DEFAULT_CHUNK_SIZE: usize = 50;
/// The bulk-enrich endpoints reject longer ID lists.
pub const MAX_CHUNK_SIZE: usize = 50;

/// One ID's slice of a bulk response.
#[derive(Debug, Clone, PartialEq)]
pub struct IdResult {
    pub id: String,
    pub result: Result<Payload, ItemError>,
}

/// Remote bulk-enrich collaborator.
pub trait Enricher: Sync {
    /// Enrich `ids` with one enrichment type. IDs missing from the returned
    /// list are treated as not found. `Err` means the call failed for every
    /// ID in it.
    fn bulk_enrich(&self, ids: &[String], type_name: &str) -> Result<Vec<IdResult>, RemoteError>;

    /// Noun used in progress lines.
    fn label(&self) -> &str {
        "records"
    }
}

/// Split `len` items into consecutive ranges of at most `max_chunk_size`,
/// itself held to 1..=[`MAX_CHUNK_SIZE`].
pub fn plan_chunks(len: usize, max_chunk_size: usize) -> Vec<Range<usize>> {
    let size = max_chunk_size.clamp(1, MAX_CHUNK_SIZE);
    (0..len)
        .step_by(size)
        .map(|start| start..(start + size).min(len))
        .collect()
}

enum ChunkResult {
    Done(Vec<IdResult>),
    Failed(RetryFailure),
    Cancelled,
}

/// Run all chunks with bounded parallelism.
///
/// Output has exactly one item per request, in request order. A chunk that
/// fails after retries marks only its own items as failed. Authentication
/// failure stops further dispatch and aborts the run.
pub fn run(
    enricher: &dyn Enricher,
    items: &[EnrichmentRequest],
    types: &[String],
    max_chunk_size: usize,
    ctx: &RunContext,
) -> Result<Vec<EnrichmentItem>, PipelineError> {
    let chunks = plan_chunks(items.len(), max_chunk_size);
    let total = chunks.len();
    let label = enricher.label();

    let results = ctx.pool.map(&chunks, |c, range| {
        if ctx.cancel.is_cancelled() {
            return ChunkResult::Cancelled;
        }
        let ids: Vec<String> = items[range.clone()].iter().map(|r| r.id.clone()).collect();
        info!("Batch {}/{}: enriching {} {}", c + 1, total, ids.len(), label);
        enrich_chunk(enricher, &ids, types, ctx, c, total)
    });

    let mut out = Vec::with_capacity(items.len());
    for (range, result) in chunks.into_iter().zip(results) {
        let chunk = &items[range];
        match result {
            ChunkResult::Done(found) => {
                let mut by_id: HashMap<String, Result<Payload, ItemError>> = HashMap::new();
                for r in found {
                    by_id.entry(r.id).or_insert(r.result);
                }
                for req in chunk {
                    let result = by_id
                        .get(&req.id)
                        .cloned()
                        .unwrap_or_else(|| Err(ItemError::not_found(&req.id)));
                    out.push(item(req, result));
                }
            }
            ChunkResult::Failed(failure) if failure.error.is_auth() => {
                return Err(PipelineError::Fatal(failure.error));
            }
            ChunkResult::Failed(failure) => {
                let err = ItemError::chunk_failed(failure.to_string());
                out.extend(chunk.iter().map(|req| item(req, Err(err.clone()))));
            }
            ChunkResult::Cancelled => {
                out.extend(chunk.iter().map(|req| item(req, Err(ItemError::cancelled()))));
            }
        }
    }
    Ok(out)
}

/// One retried call per type. A type that already succeeded is never sent
/// again; a type that fails after retries fails the chunk.
fn enrich_chunk(
    enricher: &dyn Enricher,
    ids: &[String],
    types: &[String],
    ctx: &RunContext,
    c: usize,
    total: usize,
) -> ChunkResult {
    let mut merged: Vec<IdResult> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for type_name in types {
        if ctx.cancel.is_cancelled() {
            return ChunkResult::Cancelled;
        }
        let what = format!("bulk enrich {type_name}");
        match ctx.attempt(&what, |_| enricher.bulk_enrich(ids, type_name)) {
            Ok(found) => {
                debug!("{type_name}: {} of {} IDs returned", found.len(), ids.len());
                for r in found {
                    match index.get(&r.id) {
                        None => {
                            index.insert(r.id.clone(), merged.len());
                            merged.push(r);
                        }
                        Some(&i) => combine(&mut merged[i].result, r.result),
                    }
                }
            }
            Err(failure) if failure.error.is_auth() => {
                ctx.cancel.cancel();
                return ChunkResult::Failed(failure);
            }
            Err(_) if ctx.cancel.is_cancelled() => return ChunkResult::Cancelled,
            Err(failure) => {
                warn!("Batch {}/{} failed: {}", c + 1, total, failure);
                return ChunkResult::Failed(failure);
            }
        }
    }
    ChunkResult::Done(merged)
}

/// Success under any type wins over an error under another.
fn combine(into: &mut Result<Payload, ItemError>, from: Result<Payload, ItemError>) {
    match (into.as_mut(), from) {
        (Ok(existing), Ok(more)) => merge_payload(existing, more),
        (Err(_), Ok(more)) => *into = Ok(more),
        (_, Err(_)) => {}
    }
}

/// Merge `from` into `into`. Nulls and empty strings never overwrite;
/// nested objects merge key by key.
pub fn merge_payload(into: &mut Payload, from: Payload) {
    for (key, value) in from {
        match value {
            Value::Null => {}
            Value::String(s) if s.is_empty() => {}
            Value::Object(inner) => match into.get_mut(&key) {
                Some(Value::Object(existing)) => merge_payload(existing, inner),
                _ => {
                    into.insert(key, Value::Object(inner));
                }
            },
            other => {
                into.insert(key, other);
            }
        }
    }
}

fn item(req: &EnrichmentRequest, result: Result<Payload, ItemError>) -> EnrichmentItem {
    EnrichmentItem {
        source_index: req.source_index,
        id: req.id.clone(),
        result,
    }
}
