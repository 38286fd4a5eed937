//! Task type and its attempt state machine.

use crate::{CategoryName, CategorySpec, CoreError, Priority, TaskId, TaskStatus};
use serde_json::Value;
use std::time::Duration;

/// What happened to a task after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Attempts remain; the task is back to `Pending`.
    Retry,
    /// The attempt limit was reached; the task is `Failed`.
    Exhausted,
}

/// A Task is one entry of a catalog.
///
/// Identity fields are fixed at generation time. Execution state only changes
/// through [`Task::start`], [`Task::succeed`] and [`Task::fail`].
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Unique task identifier.
    pub id: TaskId,

    /// 1-based position in the catalog.
    pub number: u32,

    /// Category the task belongs to.
    pub category: CategoryName,

    /// 1-based position within the category.
    pub sequence: u32,

    /// Display name, e.g. "Backtest Strategy 3".
    pub name: String,

    /// Priority copied from the category.
    pub priority: Priority,

    /// Expanded from the category's description template.
    pub description: Option<String>,

    /// Inputs for the unit of work, expanded from the category's template.
    pub parameters: Value,

    status: TaskStatus,
    attempts: u32,
    last_error: Option<String>,
    duration: Option<Duration>,
    result: Option<Value>,
}

impl Task {
    /// Create the `sequence`-th task of a category.
    pub fn new(number: u32, spec: &CategorySpec, sequence: u32) -> Self {
        Self {
            id: TaskId::for_sequence(spec.name.as_str(), sequence),
            number,
            category: spec.name.clone(),
            sequence,
            name: format!("{} {}", spec.label(), sequence),
            priority: spec.priority,
            description: spec.description_for(sequence),
            parameters: spec.parameters_for(sequence),
            status: TaskStatus::Pending,
            attempts: 0,
            last_error: None,
            duration: None,
            result: None,
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Number of attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Time from the first attempt to the terminal state.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Payload returned by the successful attempt.
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Begin an attempt. Returns the 1-based attempt number.
    pub fn start(&mut self, max_attempts: u32) -> Result<u32, CoreError> {
        if self.status != TaskStatus::Pending {
            return Err(self.invalid(TaskStatus::Running));
        }
        if self.attempts >= max_attempts {
            return Err(CoreError::AttemptsExhausted {
                task: self.id.to_string(),
                attempts: self.attempts,
            });
        }
        self.attempts += 1;
        self.status = TaskStatus::Running;
        Ok(self.attempts)
    }

    /// Record a successful attempt.
    pub fn succeed(&mut self, duration: Duration, result: Value) -> Result<(), CoreError> {
        if self.status != TaskStatus::Running {
            return Err(self.invalid(TaskStatus::Succeeded));
        }
        self.status = TaskStatus::Succeeded;
        self.duration = Some(duration);
        self.result = Some(result);
        Ok(())
    }

    /// Record a failed attempt.
    ///
    /// `duration` is only kept when the failure is terminal.
    pub fn fail(
        &mut self,
        error: impl Into<String>,
        max_attempts: u32,
        duration: Duration,
    ) -> Result<AttemptOutcome, CoreError> {
        if self.status != TaskStatus::Running {
            return Err(self.invalid(TaskStatus::Failed));
        }
        self.last_error = Some(error.into());
        if self.attempts < max_attempts {
            self.status = TaskStatus::Pending;
            Ok(AttemptOutcome::Retry)
        } else {
            self.status = TaskStatus::Failed;
            self.duration = Some(duration);
            Ok(AttemptOutcome::Exhausted)
        }
    }

    fn invalid(&self, to: TaskStatus) -> CoreError {
        CoreError::InvalidStateTransition {
            task: self.id.to_string(),
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task() -> Task {
        let spec = CategorySpec::new("backtesting", 10, Priority::Medium)
            .with_display_name("Backtest Strategy")
            .with_description("Backtest trading strategy variant {n}")
            .with_parameters(json!({"strategy_variant": "{n}", "lookback_days": 30}));
        Task::new(21, &spec, 3)
    }

    #[test]
    fn test_new_task_is_pending() {
        let task = task();
        assert_eq!(task.id.as_str(), "backtesting-003");
        assert_eq!(task.name, "Backtest Strategy 3");
        assert_eq!(
            task.description.as_deref(),
            Some("Backtest trading strategy variant 3")
        );
        assert_eq!(
            task.parameters,
            json!({"strategy_variant": 3, "lookback_days": 30})
        );
        assert_eq!(task.status(), TaskStatus::Pending);
        assert_eq!(task.attempts(), 0);
        assert!(task.duration().is_none());
    }

    #[test]
    fn test_success_on_first_attempt() {
        let mut task = task();
        assert_eq!(task.start(3).unwrap(), 1);
        assert_eq!(task.status(), TaskStatus::Running);

        task.succeed(Duration::from_millis(20), json!({"sharpe_ratio": 1.5}))
            .unwrap();
        assert_eq!(task.status(), TaskStatus::Succeeded);
        assert_eq!(task.duration(), Some(Duration::from_millis(20)));
        assert_eq!(task.result(), Some(&json!({"sharpe_ratio": 1.5})));
    }

    #[test]
    fn test_failure_returns_to_pending_until_exhausted() {
        let mut task = task();

        task.start(2).unwrap();
        let outcome = task.fail("boom", 2, Duration::from_millis(5)).unwrap();
        assert_eq!(outcome, AttemptOutcome::Retry);
        assert_eq!(task.status(), TaskStatus::Pending);
        assert!(task.duration().is_none());

        task.start(2).unwrap();
        let outcome = task.fail("boom again", 2, Duration::from_millis(9)).unwrap();
        assert_eq!(outcome, AttemptOutcome::Exhausted);
        assert_eq!(task.status(), TaskStatus::Failed);
        assert_eq!(task.attempts(), 2);
        assert_eq!(task.last_error(), Some("boom again"));
        assert_eq!(task.duration(), Some(Duration::from_millis(9)));
    }

    #[test]
    fn test_start_refused_past_limit() {
        let mut task = task();
        task.start(1).unwrap();
        task.fail("boom", 2, Duration::ZERO).unwrap();

        let err = task.start(1).unwrap_err();
        assert!(matches!(err, CoreError::AttemptsExhausted { attempts: 1, .. }));
    }

    #[test]
    fn test_terminal_states_reject_transitions() {
        let mut task = task();
        task.start(1).unwrap();
        task.succeed(Duration::ZERO, Value::Null).unwrap();

        assert!(matches!(
            task.start(3),
            Err(CoreError::InvalidStateTransition { .. })
        ));
        assert!(task.fail("late", 3, Duration::ZERO).is_err());
        assert!(task.succeed(Duration::ZERO, Value::Null).is_err());
    }

    #[test]
    fn test_succeed_requires_running() {
        let mut task = task();
        let err = task.succeed(Duration::ZERO, Value::Null).unwrap_err();
        assert!(err.to_string().contains("PENDING -> SUCCEEDED"));
    }
}
