use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::models::PeriodDocument;
use crate::period::PeriodKey;

const RUN_SUMMARY_FILE: &str = "resumen_ejecucion.json";
const STATISTICS_FILE: &str = "resumen_estadisticas.json";

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to create directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("Failed to serialize {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("Failed to list {}: {source}", path.display())]
    List { path: PathBuf, source: io::Error },
}

/// Serialize `value` as indented UTF-8 JSON and atomically replace `path`
///
/// Non-ASCII text is written literally. The document is first written to a
/// temporary file next to `path` and then renamed over it. The replaced file's
/// permissions are kept; a new file gets `0o644` on Unix.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|source| PersistenceError::CreateDir {
        path: parent.clone(),
        source,
    })?;

    let mut body = serde_json::to_vec_pretty(value).map_err(|source| {
        PersistenceError::Serialize {
            path: path.to_path_buf(),
            source,
        }
    })?;
    body.push(b'\n');

    let write_err = |source: io::Error| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
    tmp.write_all(&body).map_err(write_err)?;
    apply_output_permissions(tmp.as_file(), path).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    debug!("Wrote {} bytes to {}", body.len(), path.display());
    Ok(())
}

// NamedTempFile is created 0600; published outputs must stay world-readable
#[cfg(unix)]
fn apply_output_permissions(file: &fs::File, path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let permissions = fs::metadata(path)
        .map(|m| m.permissions())
        .unwrap_or_else(|_| fs::Permissions::from_mode(0o644));
    file.set_permissions(permissions)
}

#[cfg(not(unix))]
fn apply_output_permissions(file: &fs::File, path: &Path) -> io::Result<()> {
    match fs::metadata(path) {
        Ok(existing) => file.set_permissions(existing.permissions()),
        Err(_) => Ok(()),
    }
}

/// File layout of the data directory
///
/// ```text
/// <data_dir>/<year>_trimestre_<Q>.json   one per period
/// <data_dir>/resumen_ejecucion.json      last run summary
/// <data_dir>/resumen_estadisticas.json   statistics index
/// ```
#[derive(Debug, Clone)]
pub struct JsonStore {
    data_dir: PathBuf,
}

impl JsonStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn period_path(&self, key: PeriodKey) -> PathBuf {
        self.data_dir.join(format!("{}.json", key.slug()))
    }

    pub fn run_summary_path(&self) -> PathBuf {
        self.data_dir.join(RUN_SUMMARY_FILE)
    }

    pub fn statistics_path(&self) -> PathBuf {
        self.data_dir.join(STATISTICS_FILE)
    }

    /// Persist a period document, fully replacing any earlier one for the same key
    #[instrument(skip(self, document), fields(period = %document.key()))]
    pub fn save_period(&self, document: &PeriodDocument) -> Result<PathBuf, PersistenceError> {
        let path = self.period_path(document.key());
        write_json(&path, document)?;
        Ok(path)
    }

    /// Period documents currently on disk, in ascending (year, quarter) order
    ///
    /// Only files named after a period slug are returned. A missing data
    /// directory yields an empty list.
    pub fn list_period_documents(&self) -> Result<Vec<(PeriodKey, PathBuf)>, PersistenceError> {
        let entries = match fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Data directory {} does not exist", self.data_dir.display());
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(PersistenceError::List {
                    path: self.data_dir.clone(),
                    source,
                })
            }
        };

        let mut documents = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| PersistenceError::List {
                path: self.data_dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            // Canonical names only, so "+2023_trimestre_I" cannot shadow a period
            match PeriodKey::from_slug(stem) {
                Some(key) if key.slug() == stem => documents.push((key, path)),
                Some(key) => warn!(
                    "Ignoring non-canonical file name for {key}: {}",
                    path.display()
                ),
                None => {}
            }
        }

        documents.sort_by_key(|(key, _)| *key);
        Ok(documents)
    }
}
