//! taskloop Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Async runtime
//! - File system or network I/O
//!
//! The attempt state machine lives on [`Task`] so every caller goes through the
//! same transitions.

pub mod category;
pub mod error;
pub mod event;
pub mod ids;
pub mod status;
pub mod summary;
pub mod task;

// Re-export commonly used types
pub use category::{CategoryName, CategorySpec};
pub use error::CoreError;
pub use event::{ProgressEvent, ProgressEventKind, ProgressSnapshot};
pub use ids::{RunId, TaskId};
pub use status::{Priority, TaskStatus};
pub use summary::{RunSummary, SummaryStats, TaskRecord};
pub use task::{AttemptOutcome, Task};
