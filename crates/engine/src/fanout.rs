//! Fan-out search: one paginated search per key, merged and de-duplicated.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::context::RunContext;
use crate::error::{PipelineError, RemoteError};
use crate::paginate::{collect, PageRequest, SearchPage};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyStats {
    #[serde(rename = "business_id")]
    pub key: String,
    /// Records kept for this key after de-duplication.
    pub count: usize,
    /// Records the provider returned for this key.
    #[serde(skip)]
    pub found: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FanoutReport {
    pub records: Vec<Value>,
    pub per_key: Vec<KeyStats>,
    pub workers: usize,
}

impl FanoutReport {
    pub fn errors(&self) -> usize {
        self.per_key.iter().filter(|s| s.error.is_some()).count()
    }

    /// `_search_meta` block: totals plus min/max/avg over successful keys.
    pub fn meta(&self) -> Value {
        let counts: Vec<usize> = self
            .per_key
            .iter()
            .filter(|s| s.error.is_none())
            .map(|s| s.count)
            .collect();

        let mut meta = json!({
            "companies_searched": self.per_key.len(),
            "concurrency": self.workers,
            "total_prospects": self.records.len(),
            "errors": self.errors(),
            "per_company": self.per_key,
        });
        if let (Some(min), Some(max)) = (counts.iter().min(), counts.iter().max()) {
            let avg = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
            meta["min"] = json!(min);
            meta["max"] = json!(max);
            meta["avg"] = json!((avg * 10.0).round() / 10.0);
        }
        meta
    }
}

/// Trim, drop blanks and duplicates; keep first-seen order.
pub fn dedupe_keys(keys: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    keys.iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty() && seen.insert(k.to_string()))
        .map(str::to_string)
        .collect()
}

/// Run one [`collect`] per key through the worker pool.
///
/// Results merge in key order. A record whose `id_field` was already seen
/// under an earlier key is dropped. A failing key is recorded in its stats
/// and does not affect the others, except for authentication failures which
/// abort the run.
pub fn fan_out<F>(
    keys: &[String],
    id_field: &str,
    request: PageRequest,
    fetch: F,
    ctx: &RunContext,
) -> Result<FanoutReport, PipelineError>
where
    F: Fn(&str, u32, u32) -> Result<SearchPage, RemoteError> + Sync,
{
    let keys = dedupe_keys(keys);
    info!("Searching {} companies (concurrency: {})", keys.len(), ctx.pool.workers());

    let results = ctx.pool.map(&keys, |_, key| {
        let result = collect(|page, size| fetch(key.as_str(), page, size), request, ctx);
        if matches!(result, Err(PipelineError::Fatal(_))) {
            // stop sibling keys from reusing a rejected key
            ctx.cancel.cancel();
        }
        result
    });

    let mut records = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut per_key = Vec::with_capacity(keys.len());

    for (key, result) in keys.into_iter().zip(results) {
        let collected = match result {
            Ok(c) => c,
            Err(PipelineError::Fatal(e)) => return Err(PipelineError::Fatal(e)),
            Err(e) => {
                warn!("{key}: {e}");
                per_key.push(KeyStats { key, count: 0, found: 0, error: Some(e.to_string()) });
                continue;
            }
        };

        let found = collected.records.len();
        let mut kept = 0;
        for record in collected.records {
            match record.get(id_field).and_then(Value::as_str).filter(|s| !s.is_empty()) {
                Some(id) if !seen_ids.insert(id.to_string()) => continue,
                _ => {}
            }
            records.push(record);
            kept += 1;
        }
        if kept < found {
            info!("{key}: {found} found, {} duplicates removed", found - kept);
        } else {
            info!("{key}: {found} found");
        }
        per_key.push(KeyStats {
            key,
            count: kept,
            found,
            error: collected.failure.map(|f| f.to_string()),
        });
    }

    Ok(FanoutReport {
        records,
        per_key,
        workers: ctx.pool.workers(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_trimmed_and_deduped() {
        let keys = vec![" a".to_string(), "b".into(), "a".into(), "".into(), "c ".into()];
        assert_eq!(dedupe_keys(&keys), vec!["a", "b", "c"]);
    }

    #[test]
    fn meta_stats_ignore_failed_keys() {
        let report = FanoutReport {
            records: vec![],
            per_key: vec![
                KeyStats { key: "a".into(), count: 2, found: 2, error: None },
                KeyStats { key: "b".into(), count: 5, found: 5, error: None },
                KeyStats { key: "c".into(), count: 0, found: 0, error: Some("boom".into()) },
            ],
            workers: 5,
        };
        let meta = report.meta();
        assert_eq!(meta["errors"], 1);
        assert_eq!(meta["min"], 2);
        assert_eq!(meta["max"], 5);
        assert_eq!(meta["avg"], 3.5);
    }
}
