use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Running counters for a scheduler. All updates are relaxed.
#[derive(Debug)]
pub struct SchedulerStats {
    /// Jobs that ran to completion or panicked.
    pub jobs_executed: AtomicU64,
    /// Jobs popped from a queue other than the thread's starting queue.
    pub jobs_stolen: AtomicU64,
    /// Jobs run on the submitting thread because the target queue was full.
    pub inline_executions: AtomicU64,
    pub task_panics: AtomicU64,
    /// Times a worker came back from the semaphore.
    pub worker_wakeups: AtomicU64,
    pub start_time: Instant,
}

impl SchedulerStats {
    pub fn new() -> Self {
        Self {
            jobs_executed: AtomicU64::new(0),
            jobs_stolen: AtomicU64::new(0),
            inline_executions: AtomicU64::new(0),
            task_panics: AtomicU64::new(0),
            worker_wakeups: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub(crate) fn record_job(&self, stolen: bool, succeeded: bool) {
        self.jobs_executed.fetch_add(1, Ordering::Relaxed);
        if stolen {
            self.jobs_stolen.fetch_add(1, Ordering::Relaxed);
        }
        if !succeeded {
            self.task_panics.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            jobs_executed: self.jobs_executed.load(Ordering::Relaxed),
            jobs_stolen: self.jobs_stolen.load(Ordering::Relaxed),
            inline_executions: self.inline_executions.load(Ordering::Relaxed),
            task_panics: self.task_panics.load(Ordering::Relaxed),
            worker_wakeups: self.worker_wakeups.load(Ordering::Relaxed),
            elapsed_seconds: self.start_time.elapsed().as_secs_f64(),
        }
    }
}

impl Default for SchedulerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`SchedulerStats`] at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub jobs_executed: u64,
    pub jobs_stolen: u64,
    pub inline_executions: u64,
    pub task_panics: u64,
    pub worker_wakeups: u64,
    pub elapsed_seconds: f64,
}

impl StatsSnapshot {
    pub fn jobs_per_second(&self) -> f64 {
        if self.elapsed_seconds > 0.0 {
            self.jobs_executed as f64 / self.elapsed_seconds
        } else {
            0.0
        }
    }

    /// Fraction of executed jobs that were stolen.
    pub fn steal_ratio(&self) -> f64 {
        if self.jobs_executed == 0 {
            0.0
        } else {
            self.jobs_stolen as f64 / self.jobs_executed as f64
        }
    }
}
