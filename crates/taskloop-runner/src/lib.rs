//! taskloop runner
//!
//! Generates a task catalog from a category table, executes it on a bounded
//! worker pool with retry and timeouts, tracks progress, and persists one
//! record per run.

pub mod catalog;
pub mod config;
pub mod error;
pub mod handler;
pub mod logger;
pub mod retry;
pub mod runner;
pub mod tracker;

use std::path::PathBuf;

use taskloop_core::RunSummary;
use tracing::error;

pub use catalog::{generate, Catalog, CatalogConfig};
pub use config::RunnerConfig;
pub use error::{ConfigurationError, PersistenceError, RunError, TaskExecutionError};
pub use handler::{FnWork, HandlerRegistry, UnitOfWork};
pub use logger::{DirectoryStore, JsonLinesStore, RunRecord, RunStore};
pub use retry::RetryPolicy;
pub use runner::TaskRunner;
pub use tracker::ProgressTracker;

/// A finished run and where its record was written.
#[derive(Debug, Clone)]
pub struct PersistedRun {
    pub summary: RunSummary,
    pub location: PathBuf,
}

/// Generate the catalog, execute it and persist the summary.
///
/// If persisting fails, the error still carries the summary.
pub async fn execute_run(
    runner: &TaskRunner,
    catalog: &CatalogConfig,
    store: &dyn RunStore,
) -> Result<PersistedRun, RunError> {
    let catalog = generate(catalog)?;
    let summary = runner.run(catalog).await?;

    match store.append(&summary) {
        Ok(location) => Ok(PersistedRun { summary, location }),
        Err(source) => {
            error!(run = %summary.run_id, error = %source, "Failed to persist run record");
            Err(RunError::Persistence {
                source,
                summary: Box::new(summary),
            })
        }
    }
}
