//! Command output: JSON, CSV or a plain-text table, to stdout or a file.
//!
//! Commands build one `serde_json::Value` (usually the
//! `{"status", "data", ...meta}` envelope) and hand it to [`Output::emit`].
//! CSV and table renderers pull the record list out of `data`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use explorium_config::OutputFormat;
use explorium_engine::aggregate::{FailureKind, Summary};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::util::{display_width, pad_right, truncate_display};
use crate::CliError;

/// Widest table cell, in display columns.
pub const MAX_CELL_WIDTH: usize = 50;

/// Failures listed under the `--summary` line.
const SUMMARY_FAILURES_SHOWN: usize = 5;

#[derive(Debug, Clone)]
pub struct Output {
    pub format: OutputFormat,
    /// Clean output goes here instead of stdout. Table falls back to JSON.
    pub file: Option<PathBuf>,
}

impl Output {
    pub fn emit(&self, value: &Value) -> Result<(), CliError> {
        if let Some(path) = &self.file {
            let format = match self.format {
                OutputFormat::Table => OutputFormat::Json,
                other => other,
            };
            let text = render(value, format)?;
            fs::write(path, text)
                .map_err(|e| CliError::io(format!("cannot write {}: {}", path.display(), e)))?;
            info!("Output written to {}", path.display());
            return Ok(());
        }

        let text = render(value, self.format)?;
        let mut stdout = io::stdout().lock();
        match stdout.write_all(text.as_bytes()).and_then(|_| stdout.flush()) {
            // `explorium ... | head` closes the pipe early; not an error.
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
            Err(e) => Err(CliError::io(format!("cannot write output: {}", e))),
            Ok(()) => Ok(()),
        }
    }
}

/// `{"status": "success", "data": data}` plus any meta blocks.
pub fn envelope(data: Value, meta: &[(&str, Value)]) -> Value {
    let mut out = Map::new();
    out.insert("status".into(), json!("success"));
    out.insert("data".into(), data);
    for (key, value) in meta {
        out.insert((*key).to_string(), value.clone());
    }
    Value::Object(out)
}

pub fn render(value: &Value, format: OutputFormat) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => to_json(value),
        OutputFormat::Csv => match records(value) {
            Some(rows) => to_csv(&rows),
            None => to_json(value),
        },
        OutputFormat::Table => match records(value) {
            Some(rows) => Ok(to_table(&rows)),
            None => to_json(value),
        },
    }
}

fn to_json(value: &Value) -> Result<String, CliError> {
    serde_json::to_string_pretty(value)
        .map(|s| s + "\n")
        .map_err(|e| CliError::io(format!("cannot serialize output: {}", e)))
}

/// Record list of an output value: `data` of an envelope, a bare array, or
/// a single object. `None` when there is nothing tabular.
fn records(value: &Value) -> Option<Vec<&Map<String, Value>>> {
    let data = match value {
        Value::Object(o) if o.contains_key("data") => &o["data"],
        other => other,
    };
    match data {
        Value::Array(items) => Some(items.iter().filter_map(Value::as_object).collect()),
        Value::Object(o) => Some(vec![o]),
        _ => None,
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flatten nested values into dotted keys.
///
/// Objects recurse (`a.b`), lists of objects are indexed (`emails.0.address`),
/// lists of scalars are joined with `, `, and mixed lists become JSON text.
pub fn flatten(record: &Map<String, Value>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    flatten_into(record, "", &mut out);
    out
}

fn flatten_into(record: &Map<String, Value>, prefix: &str, out: &mut BTreeMap<String, String>) {
    for (k, v) in record {
        let key = if prefix.is_empty() { k.clone() } else { format!("{prefix}.{k}") };
        match v {
            Value::Object(inner) => flatten_into(inner, &key, out),
            Value::Array(items) if items.is_empty() => {
                out.insert(key, String::new());
            }
            Value::Array(items) if items.iter().all(Value::is_object) => {
                for (i, item) in items.iter().enumerate() {
                    if let Value::Object(inner) = item {
                        flatten_into(inner, &format!("{key}.{i}"), out);
                    }
                }
            }
            Value::Array(items) if items.iter().any(|i| i.is_object() || i.is_array()) => {
                out.insert(key, v.to_string());
            }
            Value::Array(items) => {
                let joined: Vec<String> = items.iter().map(scalar_text).collect();
                out.insert(key, joined.join(", "));
            }
            scalar => {
                out.insert(key, scalar_text(scalar));
            }
        }
    }
}

/// CSV with the sorted union of flattened keys as header.
pub fn to_csv(rows: &[&Map<String, Value>]) -> Result<String, CliError> {
    let flat: Vec<BTreeMap<String, String>> = rows.iter().map(|r| flatten(r)).collect();
    let header: BTreeSet<&str> = flat.iter().flat_map(|r| r.keys().map(String::as_str)).collect();
    if header.is_empty() {
        return Ok(String::new());
    }

    let mut wtr = csv::WriterBuilder::new().from_writer(vec![]);
    let csv_err = |e: csv::Error| CliError::io(format!("cannot write CSV: {}", e));
    wtr.write_record(&header).map_err(csv_err)?;
    for row in &flat {
        wtr.write_record(header.iter().map(|k| row.get(*k).map(String::as_str).unwrap_or("")))
            .map_err(csv_err)?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| CliError::io(format!("cannot write CSV: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| CliError::io(format!("CSV is not UTF-8: {}", e)))
}

/// Plain-text table. Columns come from the first record.
pub fn to_table(rows: &[&Map<String, Value>]) -> String {
    let Some(first) = rows.first() else {
        return "No results\n".to_string();
    };
    let columns: Vec<&String> = first.keys().collect();

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|col| {
                    let text = match row.get(col.as_str()) {
                        Some(v @ (Value::Object(_) | Value::Array(_))) => v.to_string(),
                        Some(v) => scalar_text(v),
                        None => String::new(),
                    };
                    truncate_display(&text.replace(['\n', '\r'], " "), MAX_CELL_WIDTH)
                })
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let header = display_width(col).min(MAX_CELL_WIDTH);
            cells.iter().map(|r| display_width(&r[i])).fold(header, usize::max)
        })
        .collect();

    let line = |values: Vec<String>| -> String {
        let padded: Vec<String> =
            values.iter().zip(&widths).map(|(v, w)| pad_right(v, *w)).collect();
        padded.join("  ").trim_end().to_string() + "\n"
    };

    let mut out = line(columns.iter().map(|c| c.to_string()).collect());
    out += &line(widths.iter().map(|w| "-".repeat(*w)).collect());
    for row in cells {
        out += &line(row);
    }
    out
}

// ── Summaries (stderr) ──────────────────────────────────────────────

pub fn summary_line(summary: &Summary) -> String {
    format!(
        "Matched: {}/{} | Unmatched: {} | Errors: {}",
        summary.matched, summary.total_input, summary.unmatched, summary.errored
    )
}

pub fn print_summary(summary: &Summary) {
    eprintln!("{}", summary_line(summary));
    for f in summary.failures.iter().take(SUMMARY_FAILURES_SHOWN) {
        let kind = match f.kind {
            FailureKind::Unmatched => "unmatched",
            FailureKind::Errored => "error",
        };
        eprintln!("  row {}: {} ({})", f.source_index + 1, f.reason, kind);
    }
    if summary.failures.len() > SUMMARY_FAILURES_SHOWN {
        eprintln!("  ... and {} more", summary.failures.len() - SUMMARY_FAILURES_SHOWN);
    }
}

/// Breakdown of prospect search results for `--summary`.
pub fn search_summary(records: &[Value]) -> Vec<String> {
    let total = records.len();
    let mut lines = vec!["Summary:".to_string(), format!("  Total prospects found: {total}")];
    if total == 0 {
        return lines;
    }

    let field = |r: &Value, keys: &[&str]| -> String {
        keys.iter()
            .find_map(|k| r.get(*k).and_then(Value::as_str).filter(|s| !s.is_empty()))
            .unwrap_or("Unknown")
            .to_string()
    };

    let countries = tally(records.iter().map(|r| field(r, &["country_name", "country_code", "country"])));
    let mut parts: Vec<String> = countries.iter().take(10).map(|(c, n)| format!("{c} ({n})")).collect();
    if countries.len() > 10 {
        parts.push(format!("...+{} more", countries.len() - 10));
    }
    lines.push(format!("  Countries: {}", parts.join(", ")));

    let levels = tally(records.iter().map(|r| field(r, &["job_level_main", "job_level"])));
    let parts: Vec<String> = levels.iter().map(|(l, n)| format!("{l} ({n})")).collect();
    lines.push(format!("  Job levels: {}", parts.join(", ")));

    let companies: BTreeSet<&str> = records
        .iter()
        .filter_map(|r| r.get("business_id").and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .collect();
    if !companies.is_empty() {
        lines.push(format!("  Companies represented: {}", companies.len()));
    }

    let truthy = |r: &Value, keys: &[&str]| {
        keys.iter().any(|k| match r.get(*k) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Null) | None => false,
            Some(_) => true,
        })
    };
    let with_email = records.iter().filter(|r| truthy(r, &["has_email", "email"])).count();
    let with_phone = records.iter().filter(|r| truthy(r, &["has_phone_number", "phone"])).count();
    let pct = |n: usize| (n as f64 / total as f64 * 100.0).round() as u32;
    lines.push(format!("  With email: {} ({}%)", with_email, pct(with_email)));
    lines.push(format!("  With phone: {} ({}%)", with_phone, pct(with_phone)));
    lines
}

/// Counts by value, most frequent first; ties in first-seen order.
fn tally(values: impl Iterator<Item = String>) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for v in values {
        match counts.iter_mut().find(|(k, _)| *k == v) {
            Some((_, n)) => *n += 1,
            None => counts.push((v, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}
