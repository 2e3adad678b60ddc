//! Match, enrich and search flows shared by both entity kinds.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use explorium_client::EntityApi;
use explorium_engine::aggregate::Aggregated;
use explorium_engine::normalize::normalize_row;
use explorium_engine::paginate::{self, Collected};
use explorium_engine::pipeline::{self, EnrichPlan};
use explorium_engine::rows::{extract_ids, read_rows, ExtractedIds};
use explorium_engine::{
    resolver, MatchDescriptor, MatchOutcome, OutputMode, PageRequest, RawRow, RemoteError,
};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::app::App;
use crate::exit_codes::{EXIT_CANCELLED, EXIT_NO_MATCH, EXIT_REMOTE};
use crate::output::{envelope, print_summary};
use crate::CliError;

// ── Single calls ────────────────────────────────────────────────────

/// One API call under the run's retry policy. Interrupted backoff exits
/// with the cancel code rather than the remote one.
pub fn call<T>(
    app: &App,
    what: &str,
    f: impl FnMut(u32) -> Result<T, RemoteError>,
) -> Result<T, CliError> {
    app.ctx.attempt(what, f).map_err(|failure| {
        if app.ctx.cancel.is_cancelled() && !failure.error.is_auth() {
            CliError::new(EXIT_CANCELLED, format!("{} cancelled", what))
        } else {
            failure.into()
        }
    })
}

/// [`call`], then print the response in the standard envelope.
pub fn emit_call(
    app: &App,
    what: &str,
    f: impl FnMut(u32) -> Result<Value, RemoteError>,
) -> Result<(), CliError> {
    let data = call(app, what, f)?;
    app.emit(&envelope(data, &[]))
}

// ── Input ───────────────────────────────────────────────────────────

/// Read CSV or JSON rows from a file, or stdin when the path is `-`.
pub fn read_input(path: &Path) -> Result<Vec<RawRow>, CliError> {
    let (name, content) = if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| CliError::input(format!("cannot read stdin: {}", e)))?;
        (None, buf)
    } else {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::input(format!("cannot read {}: {}", path.display(), e)))?;
        (path.file_name().and_then(|n| n.to_str()).map(str::to_string), content)
    };
    let rows = read_rows(name.as_deref(), &content)?;
    info!("Read {} row(s) from {}", rows.len(), path.display());
    Ok(rows)
}

/// One row from `(canonical column, flag value)` pairs. `None` when every
/// flag is absent or blank.
pub fn flag_row(fields: &[(&str, &Option<String>)]) -> Option<RawRow> {
    let columns: Vec<(String, String)> = fields
        .iter()
        .filter_map(|(col, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (col.to_string(), v.to_string()))
        })
        .collect();
    if columns.is_empty() {
        None
    } else {
        Some(RawRow::new(columns))
    }
}

/// Normalize a flag-built row and reject it up front if it cannot match.
pub fn flag_descriptor(api: &EntityApi, row: &RawRow) -> Result<MatchDescriptor, CliError> {
    let d = normalize_row(0, row, api.kind()).map_err(|e| CliError::args(e.to_string()))?;
    d.validate()
        .map_err(|reason| CliError::args(format!("cannot match {}: {}", api.kind().plural(), reason)))?;
    Ok(d)
}

// ── Match ───────────────────────────────────────────────────────────

pub struct MatchOptions {
    pub threshold: f64,
    pub summary: bool,
    pub ids_only: bool,
}

pub fn run_match(app: &App, api: &EntityApi, rows: &[RawRow], opts: MatchOptions) -> Result<(), CliError> {
    let agg = pipeline::match_rows(api, rows, api.kind(), opts.threshold, &app.ctx)?;
    if opts.summary {
        print_summary(&agg.summary);
    }

    if opts.ids_only {
        let id_field = api.kind().id_field();
        for record in &agg.records {
            if let Some(Value::String(id)) = record.fields.get(id_field) {
                println!("{}", id);
            }
        }
        return Ok(());
    }

    app.emit(&with_match_meta(&agg))
}

fn with_match_meta(agg: &Aggregated) -> Value {
    envelope(Value::Array(agg.values()), &[("_match_meta", pipeline::match_meta(agg))])
}

// ── Single-entity enrich ────────────────────────────────────────────

/// Resolve one descriptor to an ID, or fail with a user-facing error.
/// Low-confidence candidates are listed on stderr.
pub fn resolve_one(
    app: &App,
    api: &EntityApi,
    descriptor: MatchDescriptor,
    threshold: f64,
) -> Result<String, CliError> {
    let params = describe(&api.match_params(&descriptor));
    let outcome = resolver::resolve(api, std::slice::from_ref(&descriptor), threshold, &app.ctx)?
        .into_iter()
        .next()
        .unwrap_or(MatchOutcome::NoCandidates);

    match outcome {
        MatchOutcome::Resolved { id, confidence } => {
            info!("Matched {} -> {} (confidence {:.2})", params, id, confidence);
            Ok(id)
        }
        MatchOutcome::BelowThreshold { candidates } => {
            eprintln!("Low-confidence matches for {}:", params);
            for c in &candidates {
                eprintln!("  {}  {:.2}  {}", c.id, c.confidence, c.label.as_deref().unwrap_or(""));
            }
            let best = candidates.first().map(|c| c.confidence).unwrap_or(0.0);
            Err(CliError::new(
                EXIT_NO_MATCH,
                format!("best match confidence {:.2} is below {:.2}", best, threshold),
            )
            .with_hint("pass --id, or lower --min-confidence"))
        }
        MatchOutcome::NoCandidates => Err(CliError::new(
            EXIT_NO_MATCH,
            format!("no {} match found for {}", api.kind().plural(), params),
        )),
        MatchOutcome::InvalidDescriptor { reason } => Err(CliError::args(reason)),
        MatchOutcome::Failed { reason } => Err(CliError::new(EXIT_REMOTE, reason)),
    }
}

/// `name=Acme, domain=acme.com` from match params.
fn describe(params: &Value) -> String {
    match params {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => format!("{}={}", k, s),
                other => format!("{}={}", k, other),
            })
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

/// Enrich one entity given an ID, or a flag-built row to match first.
pub fn run_enrich_one(
    app: &App,
    api: &EntityApi,
    id: Option<String>,
    row: Option<RawRow>,
    types: &[String],
    threshold: f64,
) -> Result<(), CliError> {
    let id_field = api.kind().id_field();
    let id = match (id.filter(|s| !s.trim().is_empty()), row) {
        (Some(id), _) => id.trim().to_string(),
        (None, Some(row)) => {
            let descriptor = flag_descriptor(api, &row)?;
            resolve_one(app, api, descriptor, threshold)?
        }
        (None, None) => {
            return Err(CliError::args(format!("pass --id or fields to match the {}", id_field)));
        }
    };

    let payload = call(app, "enrich", |_| api.enrich(&id, types))?;

    let mut record = Map::new();
    record.insert(id_field.to_string(), json!(id));
    for (k, v) in payload {
        if k != id_field {
            record.insert(k, v);
        }
    }
    app.emit(&envelope(Value::Object(record), &[]))
}

// ── Bulk enrich ─────────────────────────────────────────────────────

/// Where `bulk-enrich` gets its IDs.
pub enum IdSource<'a> {
    /// Comma-separated `--ids`.
    List(Vec<String>),
    /// A file with an ID column; its other columns are kept in the output.
    File(&'a Path),
    /// A file of rows to match first.
    MatchFile(&'a Path),
}

pub struct EnrichOptions<'a> {
    pub types: &'a [String],
    pub threshold: f64,
    pub summary: bool,
}

pub fn run_bulk_enrich(
    app: &App,
    api: &EntityApi,
    source: IdSource<'_>,
    opts: EnrichOptions<'_>,
) -> Result<(), CliError> {
    let kind = api.kind();
    let plan = |mode| EnrichPlan {
        types: opts.types,
        chunk_size: app.settings.chunk_size,
        mode,
    };

    let agg = match source {
        IdSource::List(ids) => {
            if ids.is_empty() {
                return Err(CliError::args("--ids is empty"));
            }
            let ids = ExtractedIds::from_list(&ids);
            pipeline::enrich_ids(api, &ids, &[], kind, plan(OutputMode::BulkById), &app.ctx)?
        }
        IdSource::File(path) => {
            let rows = read_input(path)?;
            let ids = extract_ids(&rows, kind.id_field())?;
            if !ids.blank_rows.is_empty() {
                warn!("{} row(s) have no {}", ids.blank_rows.len(), kind.id_field());
            }
            pipeline::enrich_ids(api, &ids, &rows, kind, plan(OutputMode::FileEnrich), &app.ctx)?
        }
        IdSource::MatchFile(path) => {
            let rows = read_input(path)?;
            pipeline::enrich_rows(api, api, &rows, kind, opts.threshold, plan(OutputMode::BulkById), &app.ctx)?
        }
    };

    finish_enrich(app, &agg, opts.summary)
}

/// Match every row of a file, enrich the matches, keep the input columns.
pub fn run_enrich_file(
    app: &App,
    api: &EntityApi,
    path: &Path,
    opts: EnrichOptions<'_>,
) -> Result<(), CliError> {
    let rows = read_input(path)?;
    let plan = EnrichPlan {
        types: opts.types,
        chunk_size: app.settings.chunk_size,
        mode: OutputMode::FileEnrich,
    };
    let agg = pipeline::enrich_rows(api, api, &rows, api.kind(), opts.threshold, plan, &app.ctx)?;
    finish_enrich(app, &agg, opts.summary)
}

fn finish_enrich(app: &App, agg: &Aggregated, summary: bool) -> Result<(), CliError> {
    if summary {
        print_summary(&agg.summary);
    }
    app.emit(&with_match_meta(agg))
}

// ── Search ──────────────────────────────────────────────────────────

pub struct Paging {
    pub page: u32,
    pub page_size: Option<u32>,
    /// Collect this many records across pages instead of one page.
    pub total: Option<usize>,
}

/// Fetch one page, or pages until `total` records.
pub fn search(app: &App, api: &EntityApi, filters: &Value, paging: &Paging) -> Result<Collected, CliError> {
    let page_size = app.page_size(paging.page_size)?;
    let (request, size) = match paging.total {
        Some(total) => (PageRequest::until(total, page_size), total),
        None => (PageRequest::single(paging.page, page_size), page_size as usize),
    };

    let collected = paginate::collect(
        |page, page_size| api.search_page(filters, size, page, page_size),
        request,
        &app.ctx,
    )?;
    if let Some(failure) = &collected.failure {
        warn!(
            "Stopped after {} page(s): {} (after {} attempt(s))",
            collected.pages_fetched, failure.error, failure.attempts
        );
    }
    info!("Fetched {} record(s)", collected.records.len());
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn flag_row_skips_blank() {
        let name = Some("Acme".to_string());
        let domain = Some("  ".to_string());
        let row = flag_row(&[("name", &name), ("domain", &domain), ("linkedin_url", &None)]).unwrap();
        assert_eq!(row.columns, vec![("name".to_string(), "Acme".to_string())]);
        assert!(flag_row(&[("name", &None), ("domain", &domain)]).is_none());
    }

    #[test]
    fn describe_params() {
        assert_eq!(describe(&json!({"name": "Acme", "domain": "acme.com"})), "name=Acme, domain=acme.com");
    }

    #[test]
    fn read_input_by_extension() {
        let mut f = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(f, r#"[{{"name": "Acme"}}, {{"name": "Globex"}}]"#).unwrap();
        let rows = read_input(f.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("name"), Some("Globex"));
    }

    #[test]
    fn read_input_missing_file() {
        let err = read_input(Path::new("/nonexistent/rows.csv")).unwrap_err();
        assert_eq!(err.code, crate::exit_codes::EXIT_INPUT);
    }
}
