//! Scheduler configuration.

use crate::error::{Result, SchedulerError};
use serde::{Deserialize, Serialize};

/// Strategy for pinning worker threads to CPU cores.
///
/// Core 0 is always left to the thread that owns the scheduler. Pinning is
/// best effort: if the platform reports no such core, the worker simply runs
/// unpinned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PinningStrategy {
    /// No pinning (standard OS scheduling).
    #[default]
    None,
    /// Worker i -> logical processor i + 1.
    Linear,
    /// Worker i -> logical processor 2 * (i + 1), skipping SMT siblings on
    /// machines that enumerate hyperthreads adjacently.
    AvoidSmt,
}

impl PinningStrategy {
    /// Logical processor index for a worker, if this strategy pins at all.
    pub fn core_for(self, worker_id: usize) -> Option<usize> {
        match self {
            PinningStrategy::None => None,
            PinningStrategy::Linear => Some(worker_id + 1),
            PinningStrategy::AvoidSmt => Some(2 * (worker_id + 1)),
        }
    }
}

/// Order in which a thread probes queues during a work pass.
///
/// Both policies visit every queue once per pass, linearly from a starting
/// queue; they only differ in where that start is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StealOrder {
    /// Workers start at their own queue, then move to their neighbours.
    #[default]
    HomeFirst,
    /// Every pass starts at a shared cursor that advances per pass, spreading
    /// thieves across queues instead of having neighbours collide.
    Rotating,
}

/// Configuration for a [`crate::Scheduler`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of worker threads. `None` picks one per core minus the
    /// caller's core (at least one). `Some(0)` spawns no workers at all; jobs
    /// then only run inside `wait`.
    pub worker_threads: Option<usize>,
    /// Slots per worker queue. Power of two >= 2. Default: 256.
    pub queue_capacity: usize,
    pub pinning: PinningStrategy,
    pub steal_order: StealOrder,
    /// Worker threads are named `"{prefix}{id}"`.
    pub thread_name_prefix: String,
    /// Stack size for worker threads in bytes. `None` uses the platform default.
    pub stack_size: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            worker_threads: None,
            queue_capacity: 256,
            pinning: PinningStrategy::None,
            steal_order: StealOrder::HomeFirst,
            thread_name_prefix: "rustjob-worker-".to_string(),
            stack_size: None,
        }
    }
}

impl SchedulerConfig {
    pub fn with_worker_threads(mut self, count: usize) -> Self {
        self.worker_threads = Some(count);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_pinning(mut self, pinning: PinningStrategy) -> Self {
        self.pinning = pinning;
        self
    }

    pub fn with_steal_order(mut self, order: StealOrder) -> Self {
        self.steal_order = order;
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Worker thread count after resolving the hardware default.
    pub fn resolved_worker_threads(&self) -> usize {
        self.worker_threads
            .unwrap_or_else(|| num_cpus::get().saturating_sub(1).max(1))
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity < 2 || !self.queue_capacity.is_power_of_two() {
            return Err(SchedulerError::InvalidQueueCapacity(self.queue_capacity));
        }
        Ok(())
    }
}
