//! Result logger - append-only persistence of run summaries.
//!
//! Every run produces exactly one record. Stores never rewrite an existing
//! record.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use taskloop_core::RunSummary;
use tracing::info;

use crate::error::PersistenceError;

/// Serialized form of a run: the summary plus the time it was recorded.
#[derive(Debug, Serialize)]
pub struct RunRecord<'a> {
    /// RFC 3339 time the record was written.
    pub run_timestamp: String,
    #[serde(flatten)]
    pub run: &'a RunSummary,
}

impl<'a> RunRecord<'a> {
    pub fn new(run: &'a RunSummary) -> Self {
        Self {
            run_timestamp: Utc::now().to_rfc3339(),
            run,
        }
    }
}

/// Destination for run records.
pub trait RunStore: Send + Sync {
    /// Persist one run. Returns where the record was written.
    fn append(&self, summary: &RunSummary) -> Result<PathBuf, PersistenceError>;
}

/// One pretty-printed JSON file per run.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
}

impl DirectoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `run_20250101_120000_1a2b3c4d.json`
    pub fn file_name(summary: &RunSummary) -> String {
        format!(
            "run_{}_{}.json",
            summary.finished_at.format("%Y%m%d_%H%M%S"),
            summary.run_id.short()
        )
    }
}

impl RunStore for DirectoryStore {
    fn append(&self, summary: &RunSummary) -> Result<PathBuf, PersistenceError> {
        fs::create_dir_all(&self.dir).map_err(|source| PersistenceError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.dir.join(Self::file_name(summary));
        let mut bytes = serde_json::to_vec_pretty(&RunRecord::new(summary))?;
        bytes.push(b'\n');

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(PersistenceError::AlreadyExists(path));
            }
            Err(source) => return Err(PersistenceError::Io { path, source }),
        };
        file.write_all(&bytes)
            .and_then(|_| file.sync_all())
            .map_err(|source| PersistenceError::Io {
                path: path.clone(),
                source,
            })?;

        info!(path = %path.display(), run = %summary.run_id, "Run record saved");
        Ok(path)
    }
}

/// All runs appended to a single JSON Lines file.
#[derive(Debug, Clone)]
pub struct JsonLinesStore {
    path: PathBuf,
}

impl JsonLinesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RunStore for JsonLinesStore {
    fn append(&self, summary: &RunSummary) -> Result<PathBuf, PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| PersistenceError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut line = serde_json::to_vec(&RunRecord::new(summary))?;
        line.push(b'\n');

        let io_err = |source| PersistenceError::Io {
            path: self.path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        file.write_all(&line).and_then(|_| file.sync_all()).map_err(io_err)?;

        info!(path = %self.path.display(), run = %summary.run_id, "Run record appended");
        Ok(self.path.clone())
    }
}
