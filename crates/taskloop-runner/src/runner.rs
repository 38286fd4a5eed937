//! Task runner - executes a catalog on a bounded worker pool.
//!
//! Workers pull tasks from a queue sorted by priority rank and catalog number.
//! A dequeued task stays with its worker until it reaches a terminal state, so
//! a task never has two attempts in flight. Each attempt runs in its own tokio
//! task under the unit of work's timeout.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use taskloop_core::{
    AttemptOutcome, ProgressEvent, ProgressEventKind, ProgressSnapshot, RunId, RunSummary, Task,
};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::catalog::Catalog;
use crate::config::RunnerConfig;
use crate::error::{ConfigurationError, TaskExecutionError};
use crate::handler::{HandlerRegistry, UnitOfWork};
use crate::retry::RetryPolicy;
use crate::tracker::ProgressTracker;

/// Executes catalogs with retry, timeout and a global stop signal.
pub struct TaskRunner {
    config: RunnerConfig,
    registry: HandlerRegistry,
    tracker: ProgressTracker,
    events: Option<mpsc::UnboundedSender<ProgressEvent>>,
    cancel: CancellationToken,
}

impl TaskRunner {
    /// Create a new TaskRunner.
    pub fn new(config: RunnerConfig, registry: HandlerRegistry) -> Self {
        Self {
            config,
            registry,
            tracker: ProgressTracker::new(),
            events: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Send a progress event for every task transition to `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Use an externally owned stop signal.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Tracker for the run in progress (or the last one).
    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Token that stops the run when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Check that the config is sane and every category has a unit of work.
    pub fn validate(&self, catalog: &Catalog) -> Result<(), ConfigurationError> {
        self.config.validate()?;
        self.registry.ensure_covers(catalog.categories())
    }

    /// Execute every task of `catalog` and return the summary.
    ///
    /// Configuration problems are reported before any task starts. Task
    /// failures are not errors; they show up in the summary.
    pub async fn run(&self, catalog: Catalog) -> Result<RunSummary, ConfigurationError> {
        self.validate(&catalog)?;

        let run_id = RunId::generate();
        let total = catalog.len();
        let workers = self.config.workers.min(total).max(1);
        let span = info_span!("run", run = %run_id, tasks = total, workers = workers);

        async move {
            let started_at = Utc::now();
            let clock = Instant::now();
            self.tracker.begin(total);
            info!(
                max_attempts = self.config.retry.max_attempts,
                "Starting run"
            );

            let mut queue: Vec<Task> = catalog.into_tasks();
            queue.sort_by_key(|t| (t.priority.rank(), t.number));

            let shared = Arc::new(Shared {
                run_id: run_id.clone(),
                queue: Mutex::new(VecDeque::from(queue)),
                registry: self.registry.clone(),
                tracker: self.tracker.clone(),
                events: self.events.clone(),
                retry: self.config.retry,
                cancel: self.cancel.clone(),
            });

            let handles: Vec<_> = (0..workers)
                .map(|worker| {
                    let shared = Arc::clone(&shared);
                    tokio::spawn(
                        shared
                            .work()
                            .instrument(info_span!("worker", worker = worker)),
                    )
                })
                .collect();

            let mut finished = Vec::with_capacity(total);
            for handle in handles {
                match handle.await {
                    Ok(tasks) => finished.extend(tasks),
                    Err(e) => error!(error = %e, "Worker terminated abnormally"),
                }
            }

            // Whatever is still queued was never dequeued because of a stop.
            let undequeued: Vec<Task> = shared.queue.lock().await.drain(..).collect();
            if !undequeued.is_empty() {
                warn!(count = undequeued.len(), "Run stopped with tasks still queued");
            }
            finished.extend(undequeued);

            let cancelled = finished.iter().any(|t| !t.is_terminal());
            let summary = RunSummary::from_tasks(
                run_id,
                started_at,
                Utc::now(),
                clock.elapsed(),
                &finished,
                cancelled,
            );

            info!(
                completed = summary.summary.completed,
                failed = summary.summary.failed,
                not_run = summary.summary.not_run,
                success_rate = summary.summary.success_rate,
                total_time_secs = summary.summary.total_time,
                "Run finished"
            );
            Ok(summary)
        }
        .instrument(span)
        .await
    }
}

/// State shared by the workers of one run.
struct Shared {
    run_id: RunId,
    queue: Mutex<VecDeque<Task>>,
    registry: HandlerRegistry,
    tracker: ProgressTracker,
    events: Option<mpsc::UnboundedSender<ProgressEvent>>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl Shared {
    /// Worker loop: dequeue, drive to completion, repeat.
    async fn work(self: Arc<Self>) -> Vec<Task> {
        let mut done = Vec::new();
        loop {
            if self.cancel.is_cancelled() {
                debug!("Stop requested, not dequeuing further tasks");
                break;
            }
            let next = self.queue.lock().await.pop_front();
            let Some(task) = next else {
                break;
            };
            done.push(self.drive(task).await);
        }
        done
    }

    /// Run one task through its attempts until it is terminal, or until a stop
    /// leaves it pending between attempts.
    async fn drive(&self, mut task: Task) -> Task {
        let handler = self.registry.get(&task.category);
        let max_attempts = self.retry.max_attempts;
        let first_start = Instant::now();

        loop {
            let attempt = match task.start(max_attempts) {
                Ok(attempt) => attempt,
                Err(e) => {
                    error!(task_id = %task.id, error = %e, "Cannot start attempt");
                    return task;
                }
            };
            let progress = self.tracker.task_started();
            self.emit(&task, ProgressEventKind::Started { attempt }, progress);
            debug!(task_id = %task.id, attempt, "Attempt started");

            let outcome = self.attempt(&task, handler.clone()).await;
            let elapsed = first_start.elapsed();

            let error = match outcome {
                Ok(payload) => {
                    if let Err(e) = task.succeed(elapsed, payload) {
                        error!(task_id = %task.id, error = %e, "Cannot record success");
                        return task;
                    }
                    let progress = self.tracker.task_succeeded();
                    info!(
                        task_id = %task.id,
                        attempts = attempt,
                        duration_ms = elapsed.as_millis() as u64,
                        "Task succeeded"
                    );
                    self.emit(&task, ProgressEventKind::succeeded(attempt, elapsed), progress);
                    return task;
                }
                Err(e) => e.to_string(),
            };

            match task.fail(error.clone(), max_attempts, elapsed) {
                Ok(AttemptOutcome::Retry) => {
                    let progress = self.tracker.task_requeued();
                    warn!(
                        task_id = %task.id,
                        attempt,
                        max_attempts,
                        error = %error,
                        "Attempt failed, will retry"
                    );
                    self.emit(
                        &task,
                        ProgressEventKind::Retrying {
                            attempt,
                            max_attempts,
                            error,
                        },
                        progress,
                    );
                    if !self.wait_for_retry().await {
                        info!(task_id = %task.id, "Stop requested, retry abandoned");
                        return task;
                    }
                }
                Ok(AttemptOutcome::Exhausted) => {
                    let progress = self.tracker.task_failed();
                    error!(
                        task_id = %task.id,
                        attempts = attempt,
                        error = %error,
                        "Task failed after all attempts"
                    );
                    self.emit(
                        &task,
                        ProgressEventKind::failed(attempt, elapsed, error),
                        progress,
                    );
                    return task;
                }
                Err(e) => {
                    error!(task_id = %task.id, error = %e, "Cannot record failure");
                    return task;
                }
            }
        }
    }

    /// Execute a single attempt under the unit of work's timeout.
    async fn attempt(
        &self,
        task: &Task,
        handler: Option<Arc<dyn UnitOfWork>>,
    ) -> Result<Value, TaskExecutionError> {
        let Some(handler) = handler else {
            return Err(TaskExecutionError::failed(format!(
                "No unit of work registered for category '{}'",
                task.category
            )));
        };

        let budget = handler.timeout();
        let view = task.clone();
        let mut handle = tokio::spawn(async move { handler.execute(&view).await });

        match tokio::time::timeout(budget, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(TaskExecutionError::Panicked(join_error.to_string())),
            Err(_) => {
                // The attempt must be gone before the task may run again.
                handle.abort();
                let _ = handle.await;
                Err(TaskExecutionError::Timeout(budget))
            }
        }
    }

    /// Wait out the retry delay. Returns false if a stop arrived first.
    async fn wait_for_retry(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        if self.retry.delay.is_zero() {
            return true;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.retry.delay) => true,
        }
    }

    fn emit(&self, task: &Task, kind: ProgressEventKind, progress: ProgressSnapshot) {
        if let Some(tx) = &self.events {
            let event = ProgressEvent::new(self.run_id.clone(), task.id.clone(), kind, progress);
            if tx.send(event).is_err() {
                debug!("Progress receiver dropped");
            }
        }
    }
}
