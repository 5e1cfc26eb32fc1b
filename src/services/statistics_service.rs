use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::models::{AvailableDocument, StatisticsIndex, YearSummary};
use crate::period::Quarter;
use crate::store::{write_json, JsonStore, PersistenceError};
use crate::utils::utc_timestamp;

/// A prior period document that could not be read; aggregation skips it
#[derive(Error, Debug)]
pub enum AggregationReadError {
    #[error("Failed to read {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("Malformed document {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// The slice of a period document the index needs
#[derive(Debug, Deserialize)]
struct DocumentHeader {
    metadata: HeaderMetadata,
}

#[derive(Debug, Deserialize)]
struct HeaderMetadata {
    year: i32,
    #[serde(rename = "trimestre")]
    quarter: Quarter,
    #[serde(rename = "total_registros")]
    record_count: usize,
    #[serde(rename = "columnas")]
    columns: Vec<String>,
}

/// Result of one aggregation pass
#[derive(Debug)]
pub struct Aggregation {
    pub index: StatisticsIndex,
    pub skipped: Vec<AggregationReadError>,
}

/// Rebuilds the statistics index from the period documents on disk
#[derive(Debug, Clone)]
pub struct StatisticsService {
    store: JsonStore,
}

impl StatisticsService {
    pub fn new(store: JsonStore) -> Self {
        Self { store }
    }

    /// Scan every period document and build a fresh index (nothing is written)
    ///
    /// Documents are visited in ascending (year, quarter) order, which fixes the
    /// order of `trimestres_disponibles`. The `available` list is then sorted
    /// newest first using the numeric quarter rank.
    #[instrument(skip(self), fields(data_dir = %self.store.data_dir().display()))]
    pub fn aggregate(&self) -> Result<Aggregation, PersistenceError> {
        let documents = self.store.list_period_documents()?;
        debug!("Found {} period documents", documents.len());

        let mut available = Vec::new();
        let mut by_year: BTreeMap<i32, YearSummary> = BTreeMap::new();
        let mut skipped = Vec::new();

        for (_, path) in documents {
            let header = match read_header(&path) {
                Ok(header) => header.metadata,
                Err(e) => {
                    warn!("Skipping document: {e}");
                    skipped.push(e);
                    continue;
                }
            };

            available.push(AvailableDocument {
                path: path.display().to_string(),
                year: header.year,
                quarter: header.quarter,
                record_count: header.record_count,
                column_count: header.columns.len(),
            });

            let summary = by_year.entry(header.year).or_default();
            summary.quarters_available.push(header.quarter);
            summary.total_records += header.record_count;
        }

        available.sort_by(|a, b| (b.year, b.quarter).cmp(&(a.year, a.quarter)));

        let index = StatisticsIndex {
            generated_at: utc_timestamp(),
            total_documents: available.len(),
            available,
            by_year,
        };

        Ok(Aggregation { index, skipped })
    }

    /// Aggregate and replace the persisted index
    pub fn rebuild(&self) -> Result<(Aggregation, PathBuf), PersistenceError> {
        let aggregation = self.aggregate()?;
        let path = self.store.statistics_path();
        write_json(&path, &aggregation.index)?;

        info!(
            "Statistics index written to {} ({} documents, {} skipped)",
            path.display(),
            aggregation.index.total_documents,
            aggregation.skipped.len()
        );
        Ok((aggregation, path))
    }
}

fn read_header(path: &Path) -> Result<DocumentHeader, AggregationReadError> {
    let text = fs::read_to_string(path).map_err(|source| AggregationReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| AggregationReadError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}
