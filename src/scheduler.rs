//! High-level scheduler interface.
//!
//! A [`Scheduler`] owns a fixed set of worker threads and one lock-free
//! queue per worker. Work is submitted with [`Handle::execute`] (one task)
//! or [`Handle::dispatch`] (an index range split into groups) against a
//! [`Context`], and synchronized with [`Handle::wait`].
//!
//! ```no_run
//! use rustjob::{Context, Scheduler, SchedulerConfig};
//!
//! let scheduler = Scheduler::new(SchedulerConfig::default()).unwrap();
//! let ctx = Context::new();
//!
//! scheduler.dispatch(&ctx, 6, 2, |args| {
//!     println!("index {} in group {}", args.job_index, args.group_id);
//! });
//! scheduler.wait(&ctx);
//! ```

use crate::config::{SchedulerConfig, StealOrder};
use crate::context::{CompletionSignal, Context};
use crate::error::{Result, SchedulerError};
use crate::job::{GroupTask, Job, JobArgs, dispatch_group_count, group_range};
use crate::queue::JobQueue;
use crate::semaphore::Semaphore;
use crate::stats::{SchedulerStats, StatsSnapshot};
use crate::worker::{self, Worker};
use crossbeam::utils::CachePadded;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// State shared between the scheduler, its handles and its workers.
pub(crate) struct Shared {
    queues: Box<[JobQueue<Job>]>,
    next_queue: CachePadded<AtomicU32>,
    steal_cursor: CachePadded<AtomicU32>,
    steal_order: StealOrder,
    num_workers: usize,
    pub(crate) wake: Semaphore,
    pub(crate) stop: AtomicBool,
    pub(crate) completion: CompletionSignal,
    pub(crate) stats: SchedulerStats,
}

impl Shared {
    fn next_queue_index(&self) -> usize {
        self.next_queue.fetch_add(1, Ordering::Relaxed) as usize % self.queues.len()
    }

    /// Drains every queue once, starting from `home`.
    ///
    /// Each queue is popped until empty before moving on, and every job runs
    /// to completion on this thread. Returns when a full probe finds nothing.
    pub(crate) fn work(&self, home: usize) {
        let n = self.queues.len();
        let start = match self.steal_order {
            StealOrder::HomeFirst => home,
            StealOrder::Rotating => self.steal_cursor.fetch_add(1, Ordering::Relaxed) as usize,
        };

        for i in 0..n {
            let index = (start + i) % n;
            while let Some(job) = self.queues[index].pop_front() {
                let succeeded = job.execute(&self.completion);
                self.stats.record_job(index != home % n, succeeded);
            }
        }
    }

    fn submit(&self, job: Job) {
        let index = self.next_queue_index();
        match self.queues[index].push_back(job) {
            Ok(()) => {
                // After shutdown nobody takes permits; waiters drain the queue.
                if !self.stop.load(Ordering::Acquire) {
                    self.wake.release(1);
                }
            }
            Err(job) => {
                // Saturated: run it here rather than drop or block.
                tracing::warn!(
                    queue = index,
                    capacity = self.queues[index].capacity(),
                    "job queue full, executing inline"
                );
                self.stats.inline_executions.fetch_add(1, Ordering::Relaxed);
                let succeeded = job.execute(&self.completion);
                self.stats.record_job(false, succeeded);
            }
        }
    }
}

/// Cloneable submission handle to a scheduler.
///
/// Tasks capture a `Handle` to submit and wait on nested work. A handle
/// outliving its [`Scheduler`] stays usable: with the workers gone, queued
/// jobs are executed by whichever thread calls [`Handle::wait`].
#[derive(Clone)]
pub struct Handle {
    shared: Arc<Shared>,
}

impl Handle {
    /// Number of worker threads the scheduler was started with.
    pub fn thread_count(&self) -> usize {
        self.shared.num_workers
    }

    pub fn queue_count(&self) -> usize {
        self.shared.queues.len()
    }

    /// Returns true when called from one of this scheduler's worker threads.
    pub fn is_worker_thread(&self) -> bool {
        worker::current_worker_id(&self.shared).is_some()
    }

    /// Schedules a single task against `ctx`.
    ///
    /// The task runs once with `job_index == 0`. It may own move-only state.
    pub fn execute<F>(&self, ctx: &Context, task: F)
    where
        F: FnOnce(JobArgs) + Send + 'static,
    {
        ctx.add(1);
        self.shared.submit(Job::single(ctx.clone(), task));
    }

    /// Splits `0..job_count` into groups of `group_size` indices and
    /// schedules one job per group. Returns the number of groups scheduled.
    ///
    /// Indices inside a group run in increasing order on one thread. Nothing
    /// is promised about the order of different groups. Zero `job_count` or
    /// `group_size` is a no-op.
    pub fn dispatch<F>(&self, ctx: &Context, job_count: u32, group_size: u32, task: F) -> u32
    where
        F: Fn(JobArgs) + Send + Sync + 'static,
    {
        self.dispatch_shared(ctx, job_count, group_size, Arc::new(task))
    }

    fn dispatch_shared(&self, ctx: &Context, job_count: u32, group_size: u32, task: GroupTask) -> u32 {
        let group_count = dispatch_group_count(job_count, group_size);
        if group_count == 0 {
            return 0;
        }

        // Raised before any group is visible, so a concurrent wait can never
        // observe a transient zero.
        ctx.add(group_count);

        for group_id in 0..group_count {
            let range = group_range(group_id, job_count, group_size);
            self.shared
                .submit(Job::group(ctx.clone(), task.clone(), group_id, range));
        }
        group_count
    }

    /// Dispatches a task that may borrow from the caller's stack and blocks
    /// until every group has finished.
    ///
    /// Runs on a fresh [`Context`], so it is safe to call from inside a job.
    pub fn scope_dispatch<'a, F>(&self, job_count: u32, group_size: u32, task: F) -> u32
    where
        F: Fn(JobArgs) + Send + Sync + 'a,
    {
        let ctx = Context::new();
        let task: Arc<dyn Fn(JobArgs) + Send + Sync + 'a> = Arc::new(task);
        // SAFETY: every clone of `task` lives inside a job, and a job drops its
        // task before decrementing `ctx` (panics included). `wait` below does
        // not return while `ctx` is busy, so no clone outlives `'a`.
        let task: GroupTask = unsafe {
            std::mem::transmute::<Arc<dyn Fn(JobArgs) + Send + Sync + 'a>, GroupTask>(task)
        };
        let groups = self.dispatch_shared(&ctx, job_count, group_size, task);
        self.wait(&ctx);
        groups
    }

    /// Returns true while `ctx` has unfinished jobs.
    pub fn is_busy(&self, ctx: &Context) -> bool {
        ctx.is_busy()
    }

    /// Blocks until every job submitted against `ctx` has finished.
    ///
    /// A non-worker caller, or any caller if `ctx` allows main-thread work,
    /// first runs one work pass itself. That pass is what lets a task wait on
    /// nested work without deadlocking its own thread. After the pass the
    /// caller sleeps until the context goes idle.
    pub fn wait(&self, ctx: &Context) {
        if !ctx.is_busy() {
            return;
        }

        let worker_id = worker::current_worker_id(&self.shared);
        if worker_id.is_none() || ctx.allow_work_on_main_thread() {
            let home = worker_id.unwrap_or_else(|| self.shared.next_queue_index());
            self.shared.work(home);
        }

        self.shared.completion.wait_idle(ctx);
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("workers", &self.shared.num_workers)
            .field("queues", &self.shared.queues.len())
            .finish()
    }
}

/// Owns the worker threads of one pool.
///
/// All submission methods come from [`Handle`] through `Deref`. Dropping the
/// scheduler shuts it down; [`Scheduler::shutdown`] does the same but reports
/// worker panics.
pub struct Scheduler {
    handle: Handle,
    workers: Vec<Worker>,
}

impl Scheduler {
    /// Starts a scheduler and its worker threads.
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;

        let num_workers = config.resolved_worker_threads();
        let num_queues = num_workers.max(1);
        let queues = (0..num_queues)
            .map(|_| JobQueue::with_capacity(config.queue_capacity))
            .collect::<Result<Vec<_>>>()?
            .into_boxed_slice();

        let shared = Arc::new(Shared {
            queues,
            next_queue: CachePadded::new(AtomicU32::new(0)),
            steal_cursor: CachePadded::new(AtomicU32::new(0)),
            steal_order: config.steal_order,
            num_workers,
            wake: Semaphore::new(0),
            stop: AtomicBool::new(false),
            completion: CompletionSignal::default(),
            stats: SchedulerStats::new(),
        });

        // If a spawn fails, dropping `scheduler` stops the ones already running.
        let mut scheduler = Scheduler {
            handle: Handle {
                shared: Arc::clone(&shared),
            },
            workers: Vec::with_capacity(num_workers),
        };
        for id in 0..num_workers {
            let worker = Worker::spawn(id, Arc::clone(&shared), &config)?;
            scheduler.workers.push(worker);
        }

        tracing::info!(
            cores = num_cpus::get(),
            threads = num_workers,
            queue_capacity = config.queue_capacity,
            pinning = ?config.pinning,
            "scheduler initialized"
        );
        Ok(scheduler)
    }

    /// Starts a scheduler with one worker per core, minus one for the caller.
    pub fn with_default_threads() -> Result<Self> {
        Self::new(SchedulerConfig::default())
    }

    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// Stops the workers, waits for them, then runs any jobs still queued on
    /// the calling thread so no context is left busy.
    pub fn shutdown(mut self) -> Result<()> {
        match self.stop_workers() {
            0 => Ok(()),
            failed => Err(SchedulerError::WorkerPanicked(failed)),
        }
    }

    fn stop_workers(&mut self) -> usize {
        let shared = &self.handle.shared;
        shared.stop.store(true, Ordering::Release);
        shared.wake.release(self.workers.len());

        let mut failed = 0;
        for worker in self.workers.drain(..) {
            let id = worker.id();
            if worker.join().is_err() {
                tracing::error!(worker = id, "worker thread panicked");
                failed += 1;
            }
        }

        shared.work(0);
        tracing::info!("scheduler shut down");
        failed
    }
}

impl Deref for Scheduler {
    type Target = Handle;

    fn deref(&self) -> &Handle {
        &self.handle
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if !self.handle.shared.stop.load(Ordering::Acquire) {
            self.stop_workers();
        }
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("handle", &self.handle)
            .field("running", &self.workers.len())
            .finish()
    }
}
