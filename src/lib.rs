//! # rustjob - Fork-Join Job Scheduler
//!
//! A CPU task-parallelism core for game-engine style workloads: a fixed pool
//! of worker threads, one lock-free job queue per worker, and a counter-based
//! [`Context`] that callers wait on.
//!
//! ## Architecture
//!
//! - **Job queue**: bounded lock-free MPMC ring buffer, one per worker. Any
//!   thread may pop from any queue, which is how idle threads steal.
//! - **Jobs**: a task closure plus the index range `[offset, end)` it covers
//!   and the `Context` it reports completion to.
//! - **Context**: atomic count of unfinished jobs. `wait` helps drain the
//!   queues, then sleeps until the count reaches zero.
//! - **Workers**: OS threads that drain and steal, then sleep on a counting
//!   semaphore released once per submitted job.
//!
//! There is no cancellation primitive. Long-running jobs that must be
//! abortable poll a caller-owned `AtomicBool` from inside the task body.
//!
//! ## Example
//!
//! ```no_run
//! use rustjob::{Context, Scheduler, SchedulerConfig};
//!
//! let scheduler = Scheduler::new(SchedulerConfig::default()).unwrap();
//! let ctx = Context::new();
//!
//! scheduler.execute(&ctx, |_| println!("Hello from a job!"));
//! scheduler.dispatch(&ctx, 1024, 64, |args| {
//!     let _ = args.job_index;
//! });
//!
//! scheduler.wait(&ctx);
//! assert!(!scheduler.is_busy(&ctx));
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod global;
pub mod iter;
pub mod job;
pub mod queue;
pub mod scheduler;
pub mod semaphore;
pub mod stats;
pub mod worker;

pub use config::{PinningStrategy, SchedulerConfig, StealOrder};
pub use context::Context;
pub use error::SchedulerError;
pub use iter::{ParallelSlice, ParallelSliceMut};
pub use job::{JobArgs, dispatch_group_count};
pub use queue::JobQueue;
pub use scheduler::{Handle, Scheduler};
pub use stats::StatsSnapshot;

#[cfg(test)]
mod tests;
