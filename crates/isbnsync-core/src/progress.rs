use crate::dedup::RecordSet;
use isbnsync_models::Record;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("progress file {path:?} is not a JSON array of records: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on progress file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// JSON persistence for per-batch progress files and the consolidated file.
///
/// Files are pretty-printed arrays of `{"name", "isbn"}` objects with
/// non-ASCII text written as-is. Writes go through a sibling `.tmp` file and
/// a rename, so a reader never observes a half-written array.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProgressStore;

impl ProgressStore {
    pub fn new() -> Self {
        Self
    }

    /// Read the records in `path`; a missing file is an empty list.
    ///
    /// Repeated pairs in the file are collapsed (first one wins).
    pub fn load(&self, path: &Path) -> Result<Vec<Record>, ProgressError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No progress file at {:?}", path);
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(ProgressError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let records: Vec<Record> = serde_json::from_str(&content).map_err(|source| ProgressError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;

        let loaded = records.len();
        let unique = RecordSet::from_records(records).into_records();
        if unique.len() < loaded {
            warn!(
                "Progress file {:?} held {} duplicate records; ignoring them",
                path,
                loaded - unique.len()
            );
        }
        Ok(unique)
    }

    /// Like [`load`](Self::load), but never fails: a corrupt file is copied to
    /// `<path>.bak` and treated as empty, other read errors are logged.
    pub fn load_or_empty(&self, path: &Path) -> Vec<Record> {
        match self.load(path) {
            Ok(records) => {
                if !records.is_empty() {
                    info!("Loaded {} saved records from {:?}", records.len(), path);
                }
                records
            }
            Err(ProgressError::Corrupt { path, source }) => {
                let backup_path = sibling_path(&path, "bak");
                if let Err(backup_err) = std::fs::copy(&path, &backup_path) {
                    warn!(
                        "Progress file {:?} is unreadable ({}) and could not be backed up: {}. Starting empty.",
                        path, source, backup_err
                    );
                } else {
                    warn!(
                        "Progress file {:?} is unreadable ({}). Backed it up to {:?} and starting empty.",
                        path, source, backup_path
                    );
                }
                Vec::new()
            }
            Err(e) => {
                warn!("{}. Starting empty.", e);
                Vec::new()
            }
        }
    }

    pub fn save(&self, path: &Path, records: &[Record]) -> Result<(), ProgressError> {
        let io_error = |source| ProgressError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }

        let json = serde_json::to_string_pretty(records).map_err(|e| io_error(e.into()))?;

        let temp_path = sibling_path(path, "tmp");
        std::fs::write(&temp_path, json).map_err(io_error)?;
        std::fs::rename(&temp_path, path).map_err(io_error)?;

        debug!("Saved {} records to {:?}", records.len(), path);
        Ok(())
    }
}

/// `books.json` -> `books.json.<suffix>`
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}
