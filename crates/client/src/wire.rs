//! Response shapes: match rows, bulk-enrich records, search pages.
//!
//! The service is loose about envelopes (`matched_businesses` vs `data`,
//! candidates inline vs nested), so everything here reads `serde_json::Value`
//! rather than fixed structs.

use explorium_engine::{IdResult, ItemError, MatchCandidate, RemoteError, SearchPage};
use serde_json::Value;
use tracing::debug;

/// Rows under `key`, falling back to `data`. A bare array is accepted too.
pub(crate) fn result_list<'a>(body: &'a Value, key: &str) -> &'a [Value] {
    if let Some(rows) = body.as_array() {
        return rows;
    }
    body.get(key)
        .and_then(Value::as_array)
        .filter(|rows| !rows.is_empty())
        .or_else(|| body.get("data").and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// String form of an ID field. Numbers are accepted; blanks are not.
pub(crate) fn id_of(value: &Value, field: &str) -> Option<String> {
    match value.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn candidate(value: &Value, id_field: &str) -> Option<MatchCandidate> {
    let id = id_of(value, id_field)?;
    // Some responses omit the score; an ID without one is a confident match.
    let confidence = value
        .get("match_confidence")
        .or_else(|| value.get("confidence"))
        .and_then(Value::as_f64)
        .map_or(1.0, |c| c.clamp(0.0, 1.0));
    let label = ["name", "company_name", "full_name", "domain"]
        .iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .map(str::to_string);
    Some(MatchCandidate { id, confidence, label })
}

/// Per-request-row candidate lists.
///
/// A row is either a single candidate or carries a `candidates`/`matches`
/// array. A row whose ID is null has no candidates.
pub(crate) fn parse_match_rows(body: &Value, key: &str, id_field: &str) -> Vec<Vec<MatchCandidate>> {
    result_list(body, key)
        .iter()
        .map(|row| {
            let nested = row
                .get("candidates")
                .or_else(|| row.get("matches"))
                .and_then(Value::as_array);
            match nested {
                Some(list) => list.iter().filter_map(|c| candidate(c, id_field)).collect(),
                None => candidate(row, id_field).into_iter().collect(),
            }
        })
        .collect()
}

/// Split a bulk-enrich response into per-ID results.
///
/// Records are keyed by `entity_id` or `id_field`. When neither is present
/// and the response has one record per requested ID, IDs are assigned by
/// position. A record with a non-null `error` becomes an item error.
pub(crate) fn parse_bulk(body: &Value, id_field: &str, requested: &[String]) -> Vec<IdResult> {
    let records = result_list(body, "data");
    let positional = records.len() == requested.len();

    let mut out = Vec::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        let id = id_of(record, "entity_id")
            .or_else(|| id_of(record, id_field))
            .or_else(|| positional.then(|| requested[i].clone()));
        let Some(id) = id else {
            debug!("bulk record {i} has no ID; skipped");
            continue;
        };

        let result = match record.get("error").filter(|e| !e.is_null()) {
            Some(err) => Err(item_error(err)),
            None => Ok(record.as_object().cloned().unwrap_or_default()),
        };
        out.push(IdResult { id, result });
    }
    out
}

fn item_error(err: &Value) -> ItemError {
    match err {
        Value::String(s) => ItemError::new("enrich_error", s.clone()),
        Value::Object(o) => ItemError::new(
            o.get("code").and_then(Value::as_str).unwrap_or("enrich_error"),
            o.get("message").and_then(Value::as_str).unwrap_or("enrichment failed"),
        ),
        other => ItemError::new("enrich_error", other.to_string()),
    }
}

/// One search page. `total_pages`, when sent, decides whether more exist.
pub(crate) fn parse_search_page(body: &Value, page: u32) -> Result<SearchPage, RemoteError> {
    let records = match body.get("data") {
        Some(Value::Array(rows)) => rows.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            return Err(RemoteError::Protocol(format!(
                "search response `data` is not a list: {other}"
            )))
        }
    };
    let has_more = body
        .get("total_pages")
        .and_then(Value::as_u64)
        .map(|total| u64::from(page) < total);
    Ok(SearchPage { records, has_more })
}
