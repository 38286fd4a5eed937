//! Progress snapshots and the events emitted while a run executes.

use crate::ids::{RunId, TaskId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Counter buckets for one run. Every task is in exactly one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl ProgressSnapshot {
    /// Snapshot at the start of a run: everything pending.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            pending: total,
            ..Self::default()
        }
    }

    /// Tasks in a terminal state.
    pub fn resolved(&self) -> usize {
        self.completed + self.failed
    }

    /// Share of tasks that succeeded, 0.0 to 100.0.
    pub fn percentage_complete(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64 * 100.0
    }
}

/// A progress event for one task transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Run this event belongs to.
    pub run_id: RunId,
    /// Task this event belongs to.
    pub task_id: TaskId,
    /// What happened.
    pub kind: ProgressEventKind,
    /// Tracker state right after the transition.
    pub progress: ProgressSnapshot,
    /// Unix timestamp (milliseconds) when event occurred.
    pub timestamp_ms: i64,
}

impl ProgressEvent {
    /// Create a new progress event.
    pub fn new(
        run_id: RunId,
        task_id: TaskId,
        kind: ProgressEventKind,
        progress: ProgressSnapshot,
    ) -> Self {
        Self {
            run_id,
            task_id,
            kind,
            progress,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Returns true for `Succeeded` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            ProgressEventKind::Succeeded { .. } | ProgressEventKind::Failed { .. }
        )
    }
}

/// Type of progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEventKind {
    /// An attempt started.
    Started { attempt: u32 },
    /// An attempt failed and the task will run again.
    Retrying {
        attempt: u32,
        max_attempts: u32,
        error: String,
    },
    /// Task reached `Succeeded`.
    Succeeded { attempts: u32, duration_ms: u64 },
    /// Task reached `Failed`.
    Failed {
        attempts: u32,
        duration_ms: u64,
        error: String,
    },
}

impl ProgressEventKind {
    pub fn succeeded(attempts: u32, duration: Duration) -> Self {
        Self::Succeeded {
            attempts,
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn failed(attempts: u32, duration: Duration, error: impl Into<String>) -> Self {
        Self::Failed {
            attempts,
            duration_ms: duration.as_millis() as u64,
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_percentages() {
        let snapshot = ProgressSnapshot {
            total: 8,
            pending: 1,
            running: 1,
            completed: 4,
            failed: 2,
        };
        assert_eq!(snapshot.resolved(), 6);
        assert_eq!(snapshot.percentage_complete(), 50.0);
        assert_eq!(ProgressSnapshot::new(0).percentage_complete(), 0.0);
    }

    #[test]
    fn test_terminal_event() {
        let event = ProgressEvent::new(
            RunId::generate(),
            TaskId::new("health_check-001"),
            ProgressEventKind::failed(3, Duration::from_millis(1500), "timeout"),
            ProgressSnapshot::new(1),
        );
        assert!(event.is_terminal());
        assert!(event.timestamp_ms > 0);
        assert_eq!(
            event.kind,
            ProgressEventKind::Failed {
                attempts: 3,
                duration_ms: 1500,
                error: "timeout".to_string()
            }
        );
    }

    #[test]
    fn test_event_kind_is_tagged() {
        let json = serde_json::to_value(ProgressEventKind::Started { attempt: 2 }).unwrap();
        assert_eq!(json["type"], "started");
        assert_eq!(json["attempt"], 2);
    }
}
