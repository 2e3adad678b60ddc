//! Result aggregator: per-row outcomes into ordered output records plus a
//! summary that accounts for every input row.

use serde::Serialize;
use serde_json::Value;

use crate::model::{Payload, RawRow};

/// Prefix for re-attached input columns in file-enrich mode.
pub const INPUT_PREFIX: &str = "input_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Keep the original input columns, prefixed `input_`.
    FileEnrich,
    /// Only the resolved ID and the enrichment fields.
    BulkById,
}

/// Final state of one input row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Enriched { id: String, payload: Payload },
    Unmatched { reason: String },
    Errored { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Unmatched,
    Errored,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub source_index: usize,
    pub kind: FailureKind,
    pub reason: String,
}

/// `matched + unmatched + errored == total_input`, always.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total_input: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub errored: usize,
    pub failures: Vec<Failure>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    pub source_index: usize,
    pub fields: Payload,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregated {
    pub records: Vec<OutputRecord>,
    pub summary: Summary,
}

impl Aggregated {
    pub fn values(&self) -> Vec<Value> {
        self.records
            .iter()
            .map(|r| Value::Object(r.fields.clone()))
            .collect()
    }
}

/// Merge outcomes (indexed by source row) into output records.
///
/// The ID goes first, then payload fields, then (file-enrich only) the
/// original columns of `input_rows[source_index]`, minus the ID column
/// itself. An input column whose prefixed name is already a payload field
/// gets a numeric suffix.
pub fn merge(
    outcomes: &[RowOutcome],
    input_rows: &[RawRow],
    mode: OutputMode,
    id_field: &str,
) -> Aggregated {
    let mut summary = Summary {
        total_input: outcomes.len(),
        ..Summary::default()
    };
    let mut records = Vec::new();

    for (i, outcome) in outcomes.iter().enumerate() {
        match outcome {
            RowOutcome::Enriched { id, payload } => {
                summary.matched += 1;

                let mut fields = Payload::new();
                fields.insert(id_field.to_string(), Value::String(id.clone()));
                for (k, v) in payload {
                    if k != id_field {
                        fields.insert(k.clone(), v.clone());
                    }
                }
                if mode == OutputMode::FileEnrich {
                    if let Some(row) = input_rows.get(i) {
                        for (col, val) in &row.columns {
                            if col.trim().eq_ignore_ascii_case(id_field) {
                                continue;
                            }
                            let key = free_key(&fields, format!("{INPUT_PREFIX}{col}"));
                            fields.insert(key, Value::String(val.clone()));
                        }
                    }
                }
                records.push(OutputRecord { source_index: i, fields });
            }
            RowOutcome::Unmatched { reason } => {
                summary.unmatched += 1;
                summary.failures.push(Failure {
                    source_index: i,
                    kind: FailureKind::Unmatched,
                    reason: reason.clone(),
                });
            }
            RowOutcome::Errored { reason } => {
                summary.errored += 1;
                summary.failures.push(Failure {
                    source_index: i,
                    kind: FailureKind::Errored,
                    reason: reason.clone(),
                });
            }
        }
    }

    Aggregated { records, summary }
}

/// `base`, or `base_1`, `base_2`, ... if taken.
fn free_key(fields: &Payload, base: String) -> String {
    if !fields.contains_key(&base) {
        return base;
    }
    (1..)
        .map(|n| format!("{base}_{n}"))
        .find(|k| !fields.contains_key(k))
        .unwrap_or(base)
}
