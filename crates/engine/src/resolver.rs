//! Match resolver: descriptors in, one [`MatchOutcome`] per descriptor out.

use tracing::{debug, info};

use crate::context::RunContext;
use crate::error::{PipelineError, RemoteError};
use crate::model::{MatchCandidate, MatchDescriptor, MatchOutcome};
use crate::retry::RetryFailure;

pub const DEFAULT_THRESHOLD: f64 = 0.8;
/// Candidates kept on a below-threshold outcome.
pub const MAX_SUGGESTIONS: usize = 3;

/// Remote matching collaborator. Scoring is entirely its business.
pub trait Matcher: Sync {
    /// Largest batch accepted by one `match_batch` call.
    fn max_batch_size(&self) -> usize;

    /// One candidate list per descriptor, aligned with `batch`. Lists may be
    /// empty and need not be sorted.
    fn match_batch(&self, batch: &[&MatchDescriptor]) -> Result<Vec<Vec<MatchCandidate>>, RemoteError>;
}

/// Apply the threshold to one candidate list.
///
/// Candidates are ranked by descending confidence; ties keep provider order.
pub fn decide(mut candidates: Vec<MatchCandidate>, threshold: f64) -> MatchOutcome {
    if candidates.is_empty() {
        return MatchOutcome::NoCandidates;
    }
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let best = &candidates[0];
    if best.confidence >= threshold {
        MatchOutcome::Resolved {
            id: best.id.clone(),
            confidence: best.confidence,
        }
    } else {
        candidates.truncate(MAX_SUGGESTIONS);
        MatchOutcome::BelowThreshold { candidates }
    }
}

pub fn validate_threshold(threshold: f64) -> Result<(), PipelineError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(PipelineError::InvalidThreshold(threshold))
    }
}

enum BatchResult {
    Done(Vec<Vec<MatchCandidate>>),
    Failed(RetryFailure),
    Cancelled,
}

/// Resolve every descriptor. Order and length match `descriptors`.
///
/// Descriptors carrying an existing ID resolve locally at confidence 1.0.
/// Invalid ones are rejected before dispatch. A failed batch marks only its
/// own descriptors as failed; an authentication failure aborts the run.
pub fn resolve(
    matcher: &dyn Matcher,
    descriptors: &[MatchDescriptor],
    threshold: f64,
    ctx: &RunContext,
) -> Result<Vec<MatchOutcome>, PipelineError> {
    validate_threshold(threshold)?;

    let mut outcomes: Vec<Option<MatchOutcome>> = vec![None; descriptors.len()];
    let mut pending: Vec<usize> = Vec::new();

    for (i, d) in descriptors.iter().enumerate() {
        if let Some(id) = &d.existing_id {
            outcomes[i] = Some(MatchOutcome::Resolved {
                id: id.clone(),
                confidence: 1.0,
            });
        } else if let Err(reason) = d.validate() {
            outcomes[i] = Some(MatchOutcome::InvalidDescriptor { reason });
        } else {
            pending.push(i);
        }
    }

    let batches: Vec<&[usize]> = pending.chunks(matcher.max_batch_size().max(1)).collect();
    let total = batches.len();
    if total > 0 {
        debug!("matching {} descriptors in {} batch(es)", pending.len(), total);
    }

    let results = ctx.pool.map(&batches, |b, indices| {
        if ctx.cancel.is_cancelled() {
            return BatchResult::Cancelled;
        }
        info!("Match batch {}/{}: {} descriptor(s)", b + 1, total, indices.len());
        let batch: Vec<&MatchDescriptor> = indices.iter().map(|&i| &descriptors[i]).collect();

        let result = ctx.attempt("match", |_| {
            let rows = matcher.match_batch(&batch)?;
            if rows.len() != batch.len() {
                return Err(RemoteError::Protocol(format!(
                    "expected {} match results, got {}",
                    batch.len(),
                    rows.len()
                )));
            }
            Ok(rows)
        });

        match result {
            Ok(rows) => BatchResult::Done(rows),
            Err(failure) if failure.error.is_auth() => {
                ctx.cancel.cancel();
                BatchResult::Failed(failure)
            }
            Err(_) if ctx.cancel.is_cancelled() => BatchResult::Cancelled,
            Err(failure) => BatchResult::Failed(failure),
        }
    });

    for (indices, result) in batches.iter().zip(results) {
        match result {
            BatchResult::Done(rows) => {
                for (&i, candidates) in indices.iter().zip(rows) {
                    outcomes[i] = Some(decide(candidates, threshold));
                }
            }
            BatchResult::Failed(failure) if failure.error.is_auth() => {
                return Err(PipelineError::Fatal(failure.error));
            }
            BatchResult::Failed(failure) => {
                let reason = failure.to_string();
                for &i in indices.iter() {
                    outcomes[i] = Some(MatchOutcome::Failed { reason: reason.clone() });
                }
            }
            BatchResult::Cancelled => {
                for &i in indices.iter() {
                    outcomes[i] = Some(MatchOutcome::Failed {
                        reason: "cancelled".to_string(),
                    });
                }
            }
        }
    }

    Ok(outcomes
        .into_iter()
        .map(|o| o.unwrap_or(MatchOutcome::NoCandidates))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(id: &str, confidence: f64) -> MatchCandidate {
        MatchCandidate { id: id.into(), confidence, label: None }
    }

    #[test]
    fn accepts_at_threshold() {
        assert_eq!(
            decide(vec![cand("x", 0.8)], 0.8),
            MatchOutcome::Resolved { id: "x".into(), confidence: 0.8 }
        );
    }

    #[test]
    fn picks_highest_confidence() {
        let out = decide(vec![cand("a", 0.5), cand("b", 0.92), cand("c", 0.7)], 0.8);
        assert_eq!(out.resolved_id(), Some("b"));
    }

    #[test]
    fn below_threshold_keeps_top_three_sorted() {
        let out = decide(
            vec![cand("a", 0.3), cand("b", 0.65), cand("c", 0.5), cand("d", 0.6)],
            0.8,
        );
        match out {
            MatchOutcome::BelowThreshold { candidates } => {
                let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
                assert_eq!(ids, vec!["b", "d", "c"]);
            }
            other => panic!("expected below threshold, got {other:?}"),
        }
    }

    #[test]
    fn ties_keep_provider_order() {
        let out = decide(vec![cand("first", 0.5), cand("second", 0.5)], 0.9);
        match out {
            MatchOutcome::BelowThreshold { candidates } => {
                assert_eq!(candidates[0].id, "first");
                assert_eq!(candidates[1].id, "second");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_candidates() {
        assert_eq!(decide(vec![], 0.8), MatchOutcome::NoCandidates);
    }

    #[test]
    fn threshold_bounds() {
        assert!(validate_threshold(0.0).is_ok());
        assert!(validate_threshold(1.0).is_ok());
        assert!(validate_threshold(1.2).is_err());
        assert!(validate_threshold(f64::NAN).is_err());
    }
}
