//! Core domain errors.

use thiserror::Error;

/// Core domain errors for taskloop.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid state transition.
    #[error("Invalid state transition for task {task}: {from} -> {to}")]
    InvalidStateTransition {
        task: String,
        from: String,
        to: String,
    },

    /// No attempts left for the task.
    #[error("Task {task} has used all {attempts} attempt(s)")]
    AttemptsExhausted { task: String, attempts: u32 },
}
