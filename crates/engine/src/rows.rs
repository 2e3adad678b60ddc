//! Row sources: CSV or JSON text into [`RawRow`]s, plus ID-column extraction.

use serde_json::Value;

use crate::error::InputError;
use crate::model::{EnrichmentRequest, RawRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Json,
}

/// Pick the format from the file name, falling back to sniffing the content.
pub fn detect_format(name: Option<&str>, content: &str) -> InputFormat {
    if let Some(name) = name {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".csv") {
            return InputFormat::Csv;
        }
        if lower.ends_with(".json") {
            return InputFormat::Json;
        }
    }
    match content.trim_start().chars().next() {
        Some('[') | Some('{') => InputFormat::Json,
        _ => InputFormat::Csv,
    }
}

/// Detect and parse. A leading UTF-8 BOM is ignored.
pub fn read_rows(name: Option<&str>, content: &str) -> Result<Vec<RawRow>, InputError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    if content.trim().is_empty() {
        return Err(InputError::Empty);
    }
    parse_rows(content, detect_format(name, content))
}

pub fn parse_rows(content: &str, format: InputFormat) -> Result<Vec<RawRow>, InputError> {
    match format {
        InputFormat::Csv => parse_csv(content),
        InputFormat::Json => parse_json(content),
    }
}

fn parse_csv(content: &str) -> Result<Vec<RawRow>, InputError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| InputError::Csv(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(InputError::MissingHeader);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| InputError::Csv(e.to_string()))?;
        let columns = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), record.get(i).unwrap_or("").to_string()))
            .collect();
        rows.push(RawRow::new(columns));
    }
    Ok(rows)
}

fn parse_json(content: &str) -> Result<Vec<RawRow>, InputError> {
    let value: Value =
        serde_json::from_str(content).map_err(|e| InputError::Json(e.to_string()))?;

    let items = match value {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        other => return Err(InputError::NotRows(format!("found {}", json_kind(&other)))),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(map) => Ok(RawRow::new(
                map.into_iter().map(|(k, v)| (k, json_cell(v))).collect(),
            )),
            other => Err(InputError::NotRows(format!(
                "element {i} is {}",
                json_kind(&other)
            ))),
        })
        .collect()
}

fn json_cell(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => nested.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// ID extraction
// ---------------------------------------------------------------------------

/// IDs pulled from one column, with the rows that had none.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedIds {
    pub requests: Vec<EnrichmentRequest>,
    pub blank_rows: Vec<usize>,
    pub total_rows: usize,
}

impl ExtractedIds {
    /// Build from an explicit ID list (e.g. a comma-separated flag).
    pub fn from_list(ids: &[String]) -> Self {
        let mut out = Self {
            total_rows: ids.len(),
            ..Self::default()
        };
        for (i, id) in ids.iter().enumerate() {
            let id = id.trim();
            if id.is_empty() {
                out.blank_rows.push(i);
            } else {
                out.requests.push(EnrichmentRequest {
                    source_index: i,
                    id: id.to_string(),
                });
            }
        }
        out
    }
}

/// Extract the ID column (case-insensitive). Fails when the column is absent
/// everywhere or holds no non-empty value.
pub fn extract_ids(rows: &[RawRow], column: &str) -> Result<ExtractedIds, InputError> {
    if !rows.iter().any(|r| r.get(column).is_some()) {
        return Err(InputError::MissingIdColumn {
            column: column.to_string(),
            found: rows.first().map(RawRow::headers).unwrap_or_default(),
        });
    }

    let mut out = ExtractedIds {
        total_rows: rows.len(),
        ..ExtractedIds::default()
    };
    for (i, row) in rows.iter().enumerate() {
        match row.get(column).map(str::trim).filter(|v| !v.is_empty()) {
            Some(id) => out.requests.push(EnrichmentRequest {
                source_index: i,
                id: id.to_string(),
            }),
            None => out.blank_rows.push(i),
        }
    }

    if out.requests.is_empty() {
        return Err(InputError::NoIds {
            column: column.to_string(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_by_extension_then_content() {
        assert_eq!(detect_format(Some("in.CSV"), "[1]"), InputFormat::Csv);
        assert_eq!(detect_format(Some("in.json"), "a,b"), InputFormat::Json);
        assert_eq!(detect_format(Some("in.txt"), "  [{}]"), InputFormat::Json);
        assert_eq!(detect_format(None, "name,domain\n"), InputFormat::Csv);
    }

    #[test]
    fn csv_rows_keep_column_order() {
        let rows = read_rows(Some("x.csv"), "name,domain\nAcme,acme.com\nGlobex,\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].columns[0], ("name".to_string(), "Acme".to_string()));
        assert_eq!(rows[1].get("domain"), Some(""));
    }

    #[test]
    fn csv_short_record_pads_empty() {
        let rows = read_rows(None, "a,b,c\n1\n").unwrap();
        assert_eq!(rows[0].get("c"), Some(""));
    }

    #[test]
    fn bom_is_stripped() {
        let rows = read_rows(None, "\u{feff}name\nAcme\n").unwrap();
        assert_eq!(rows[0].get("name"), Some("Acme"));
    }

    #[test]
    fn json_values_are_stringified() {
        let rows = read_rows(
            None,
            r#"[{"name":"Acme","size":10,"tags":["a"],"x":null}]"#,
        )
        .unwrap();
        assert_eq!(rows[0].get("size"), Some("10"));
        assert_eq!(rows[0].get("tags"), Some(r#"["a"]"#));
        assert_eq!(rows[0].get("x"), Some(""));
    }

    #[test]
    fn json_single_object_is_one_row() {
        let rows = read_rows(Some("one.json"), r#"{"domain":"acme.com"}"#).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn json_rejects_scalars() {
        let err = read_rows(None, "[1, 2]").unwrap_err();
        assert!(matches!(err, InputError::NotRows(_)));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert_eq!(read_rows(None, "  \n").unwrap_err(), InputError::Empty);
    }

    #[test]
    fn extract_ids_tracks_blank_rows() {
        let rows = read_rows(None, "Business_ID,name\nb1,A\n,B\n b3 ,C\n").unwrap();
        let ids = extract_ids(&rows, "business_id").unwrap();
        assert_eq!(ids.total_rows, 3);
        assert_eq!(ids.blank_rows, vec![1]);
        assert_eq!(ids.requests[1], EnrichmentRequest { source_index: 2, id: "b3".into() });
    }

    #[test]
    fn extract_ids_missing_column() {
        let rows = read_rows(None, "name\nAcme\n").unwrap();
        let err = extract_ids(&rows, "business_id").unwrap_err();
        assert!(matches!(err, InputError::MissingIdColumn { .. }));
    }

    #[test]
    fn extract_ids_all_blank() {
        let rows = read_rows(None, "business_id\n\"\"\n").unwrap();
        assert!(matches!(extract_ids(&rows, "business_id"), Err(InputError::NoIds { .. })));
    }

    #[test]
    fn id_list_skips_blanks() {
        let ids = ExtractedIds::from_list(&["a".into(), " ".into(), "c".into()]);
        assert_eq!(ids.requests.len(), 2);
        assert_eq!(ids.blank_rows, vec![1]);
    }
}
