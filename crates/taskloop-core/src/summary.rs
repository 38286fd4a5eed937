//! Run summary: the final state of every task plus aggregate counts.

use crate::{CategoryName, Priority, RunId, Task, TaskId, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Final state of one task as recorded in a run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub number: u32,
    pub category: CategoryName,
    pub name: String,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Value,
    pub status: TaskStatus,
    pub attempts: u32,
    /// Seconds from first attempt to terminal state.
    pub duration: Option<f64>,
    pub last_error: Option<String>,
    pub result: Option<Value>,
}

impl From<&Task> for TaskRecord {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            number: task.number,
            category: task.category.clone(),
            name: task.name.clone(),
            priority: task.priority,
            description: task.description.clone(),
            parameters: task.parameters.clone(),
            status: task.status(),
            attempts: task.attempts(),
            duration: task.duration().map(|d| d.as_secs_f64()),
            last_error: task.last_error().map(str::to_owned),
            result: task.result().cloned(),
        }
    }
}

/// Aggregate counts for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_tasks: usize,
    pub completed: usize,
    pub failed: usize,
    /// Tasks still pending when the run stopped early.
    pub not_run: usize,
    /// completed / total, as a percentage.
    pub success_rate: f64,
    /// Wall-clock seconds for the whole run.
    pub total_time: f64,
    /// Mean duration of completed tasks, in seconds.
    pub average_task_time: f64,
    /// Whether the run was stopped before every task resolved.
    pub cancelled: bool,
}

/// Summary of one run, finalized after the last task resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Tasks in catalog order.
    pub tasks: Vec<TaskRecord>,
    pub summary: SummaryStats,
}

impl RunSummary {
    /// Build a summary from the final task states.
    ///
    /// `tasks` may arrive in completion order; records are sorted by catalog
    /// number.
    pub fn from_tasks(
        run_id: RunId,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        elapsed: Duration,
        tasks: &[Task],
        cancelled: bool,
    ) -> Self {
        let mut records: Vec<TaskRecord> = tasks.iter().map(TaskRecord::from).collect();
        records.sort_by_key(|r| r.number);

        let completed: Vec<&TaskRecord> = records
            .iter()
            .filter(|r| r.status == TaskStatus::Succeeded)
            .collect();
        let failed = records
            .iter()
            .filter(|r| r.status == TaskStatus::Failed)
            .count();
        let total = records.len();
        let not_run = total - completed.len() - failed;

        let success_rate = if total > 0 {
            completed.len() as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        let average_task_time = if completed.is_empty() {
            0.0
        } else {
            completed.iter().filter_map(|r| r.duration).sum::<f64>() / completed.len() as f64
        };

        Self {
            run_id,
            started_at,
            finished_at,
            summary: SummaryStats {
                total_tasks: total,
                completed: completed.len(),
                failed,
                not_run,
                success_rate,
                total_time: elapsed.as_secs_f64(),
                average_task_time,
                cancelled,
            },
            tasks: records,
        }
    }

    /// Every task succeeded.
    pub fn is_success(&self) -> bool {
        self.summary.failed == 0 && self.summary.not_run == 0
    }

    /// Records that ended `Failed`.
    pub fn failed_tasks(&self) -> impl Iterator<Item = &TaskRecord> {
        self.tasks.iter().filter(|r| r.status == TaskStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CategorySpec;
    use serde_json::json;

    fn finished(number: u32, spec: &CategorySpec, seq: u32, ok: bool, ms: u64) -> Task {
        let mut task = Task::new(number, spec, seq);
        task.start(1).unwrap();
        if ok {
            task.succeed(Duration::from_millis(ms), json!({})).unwrap();
        } else {
            task.fail("boom", 1, Duration::from_millis(ms)).unwrap();
        }
        task
    }

    #[test]
    fn test_summary_counts_and_order() {
        let spec = CategorySpec::new("monitoring", 4, Priority::Medium);
        let tasks = vec![
            finished(3, &spec, 3, true, 300),
            finished(1, &spec, 1, true, 100),
            finished(2, &spec, 2, false, 50),
            Task::new(4, &spec, 4),
        ];

        let now = Utc::now();
        let summary = RunSummary::from_tasks(
            RunId::new("run-1"),
            now,
            now,
            Duration::from_secs(2),
            &tasks,
            true,
        );

        let numbers: Vec<u32> = summary.tasks.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert_eq!(summary.summary.total_tasks, 4);
        assert_eq!(summary.summary.completed, 2);
        assert_eq!(summary.summary.failed, 1);
        assert_eq!(summary.summary.not_run, 1);
        assert_eq!(summary.summary.success_rate, 50.0);
        assert!((summary.summary.average_task_time - 0.2).abs() < 1e-9);
        assert_eq!(summary.summary.total_time, 2.0);
        assert!(!summary.is_success());
        assert_eq!(summary.failed_tasks().count(), 1);
    }

    #[test]
    fn test_empty_summary() {
        let now = Utc::now();
        let summary =
            RunSummary::from_tasks(RunId::generate(), now, now, Duration::ZERO, &[], false);
        assert_eq!(summary.summary.success_rate, 0.0);
        assert_eq!(summary.summary.average_task_time, 0.0);
        assert!(summary.is_success());
    }
}
