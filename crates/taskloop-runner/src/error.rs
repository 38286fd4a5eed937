//! Error types for catalog configuration, task execution and persistence.

use std::path::PathBuf;
use std::time::Duration;

use taskloop_core::RunSummary;
use thiserror::Error;

/// Malformed catalog or runner configuration. Fatal: nothing runs.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Category counts sum to {actual}, but the declared total is {declared}")]
    CountMismatch { declared: u32, actual: u64 },

    #[error("Catalog declares no categories")]
    NoCategories,

    #[error("Duplicate category: {0}")]
    DuplicateCategory(String),

    #[error("Invalid category name: {0:?}")]
    InvalidCategoryName(String),

    #[error("No unit of work registered for category '{0}'")]
    MissingHandler(String),

    #[error("Worker pool width must be at least 1")]
    ZeroWorkers,

    #[error("Retry policy must allow at least one attempt")]
    ZeroAttempts,

    #[error("Failed to read catalog '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure of a single attempt. Recovered by the retry policy.
#[derive(Debug, Clone, Error)]
pub enum TaskExecutionError {
    #[error("{0}")]
    Failed(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unit of work panicked: {0}")]
    Panicked(String),
}

impl TaskExecutionError {
    /// Convenience constructor for a plain failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// The run record could not be written.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize run record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Run record already exists: {0}")]
    AlreadyExists(PathBuf),
}

/// Error returned by a whole generate-execute-persist cycle.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Execution finished but the record was not persisted. The summary is
    /// still handed back.
    #[error("Run {} finished but could not be persisted: {source}", .summary.run_id)]
    Persistence {
        #[source]
        source: PersistenceError,
        summary: Box<RunSummary>,
    },
}
