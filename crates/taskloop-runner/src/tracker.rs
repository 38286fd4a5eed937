//! Progress tracking.
//!
//! The tracker owns the counter buckets of the current run. Each transition is
//! applied with a single `send_modify`, so readers never see a task counted
//! twice or not at all.

use std::sync::Arc;

use taskloop_core::ProgressSnapshot;
use tokio::sync::watch;

/// Shared, read-mostly view of run progress.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    tx: Arc<watch::Sender<ProgressSnapshot>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ProgressSnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    /// Current counters.
    pub fn snapshot(&self) -> ProgressSnapshot {
        *self.tx.borrow()
    }

    /// Receiver notified after every transition.
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.tx.subscribe()
    }

    pub(crate) fn begin(&self, total: usize) -> ProgressSnapshot {
        self.apply(|s| *s = ProgressSnapshot::new(total))
    }

    /// pending -> running
    pub(crate) fn task_started(&self) -> ProgressSnapshot {
        self.apply(|s| {
            s.pending = s.pending.saturating_sub(1);
            s.running += 1;
        })
    }

    /// running -> pending
    pub(crate) fn task_requeued(&self) -> ProgressSnapshot {
        self.apply(|s| {
            s.running = s.running.saturating_sub(1);
            s.pending += 1;
        })
    }

    /// running -> completed
    pub(crate) fn task_succeeded(&self) -> ProgressSnapshot {
        self.apply(|s| {
            s.running = s.running.saturating_sub(1);
            s.completed += 1;
        })
    }

    /// running -> failed
    pub(crate) fn task_failed(&self) -> ProgressSnapshot {
        self.apply(|s| {
            s.running = s.running.saturating_sub(1);
            s.failed += 1;
        })
    }

    fn apply(&self, f: impl FnOnce(&mut ProgressSnapshot)) -> ProgressSnapshot {
        let mut after = ProgressSnapshot::default();
        self.tx.send_modify(|snapshot| {
            f(snapshot);
            after = *snapshot;
        });
        after
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_move_one_unit() {
        let tracker = ProgressTracker::new();
        tracker.begin(3);

        tracker.task_started();
        tracker.task_started();
        let s = tracker.snapshot();
        assert_eq!((s.pending, s.running), (1, 2));

        tracker.task_requeued();
        tracker.task_succeeded();
        let s = tracker.snapshot();
        assert_eq!((s.pending, s.running, s.completed), (2, 0, 1));

        tracker.task_started();
        let after = tracker.task_failed();
        assert_eq!(after, tracker.snapshot());
        assert_eq!(after.pending + after.running + after.completed + after.failed, 3);
        assert_eq!(after.failed, 1);
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let tracker = ProgressTracker::new();
        let mut rx = tracker.subscribe();
        tracker.begin(2);

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().pending, 2);

        tracker.task_started();
        tracker.task_succeeded();
        rx.changed().await.unwrap();
        let latest = *rx.borrow_and_update();
        assert_eq!(latest.completed, 1);
        assert_eq!(latest.percentage_complete(), 50.0);
    }
}
