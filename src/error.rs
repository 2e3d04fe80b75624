//! Error types returned by the scheduler.

use thiserror::Error;

/// Errors raised while building, initializing or tearing down a scheduler.
///
/// Failures inside task bodies never surface here; they are caught per job
/// and only counted (see [`crate::stats::StatsSnapshot::task_panics`]).
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Queue capacity was not a power of two, or was smaller than 2.
    #[error("queue capacity must be a power of two >= 2, got {0}")]
    InvalidQueueCapacity(usize),

    /// The process-wide scheduler was initialized more than once.
    #[error("global scheduler is already initialized")]
    AlreadyInitialized,

    /// The OS refused to create a worker thread.
    #[error("failed to spawn worker thread {index}")]
    ThreadSpawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    /// One or more worker threads terminated by panicking.
    #[error("{0} worker thread(s) panicked")]
    WorkerPanicked(usize),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
