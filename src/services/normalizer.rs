use chrono::{DateTime, Utc};
use serde_json::{Number, Value};
use std::collections::HashSet;
use tracing::debug;

use crate::importers::excel_importer::{CellValue, DecodedTable};
use crate::models::{PeriodDocument, PeriodMetadata, Record};
use crate::period::PeriodKey;
use crate::utils::format_utc;

/// Turns a decoded worksheet into a persisted period document
///
/// Only missing-value normalization happens here: absent cells, error cells and
/// non-finite floats become JSON `null`. Cell contents are otherwise passed
/// through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowNormalizer;

impl RowNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, key: PeriodKey, source_url: &str, table: DecodedTable) -> PeriodDocument {
        self.normalize_at(key, source_url, table, Utc::now())
    }

    pub fn normalize_at(
        &self,
        key: PeriodKey,
        source_url: &str,
        table: DecodedTable,
        fetched_at: DateTime<Utc>,
    ) -> PeriodDocument {
        let (labels, rows) = table.into_parts();
        let columns = column_names(&labels);

        let records: Vec<Record> = rows
            .into_iter()
            .map(|row| {
                columns
                    .iter()
                    .cloned()
                    .zip(row.into_iter().map(cell_to_json))
                    .collect()
            })
            .collect();

        debug!(
            "Normalized {} records with {} columns for {key}",
            records.len(),
            columns.len()
        );

        PeriodDocument {
            metadata: PeriodMetadata {
                year: key.year,
                quarter: key.quarter,
                source_url: source_url.to_string(),
                fetched_at: format_utc(fetched_at),
                record_count: records.len(),
                column_count: columns.len(),
                columns,
            },
            records,
        }
    }
}

fn cell_to_json(cell: CellValue) -> Value {
    match cell {
        CellValue::Text(s) => Value::String(s),
        CellValue::Integer(i) => Value::Number(i.into()),
        CellValue::Number(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        CellValue::Bool(b) => Value::Bool(b),
        CellValue::Missing => Value::Null,
    }
}

/// Render raw header cells as unique, non-empty column names
///
/// Blank headers become `Unnamed: <index>`; repeated names get `.1`, `.2`, ...
fn column_names(labels: &[CellValue]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(labels.len());

    for (idx, label) in labels.iter().enumerate() {
        let base = match label_text(label) {
            Some(text) => text,
            None => format!("Unnamed: {idx}"),
        };

        let mut name = base.clone();
        let mut suffix = 1;
        while seen.contains(&name) {
            name = format!("{base}.{suffix}");
            suffix += 1;
        }
        seen.insert(name.clone());
        names.push(name);
    }

    names
}

fn label_text(label: &CellValue) -> Option<String> {
    match label {
        CellValue::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        CellValue::Text(_) | CellValue::Missing => None,
        CellValue::Integer(i) => Some(i.to_string()),
        CellValue::Number(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
            Some(format!("{f:.0}"))
        }
        CellValue::Number(f) if f.is_finite() => Some(f.to_string()),
        CellValue::Number(_) => None,
        CellValue::Bool(b) => Some(b.to_string()),
    }
}
