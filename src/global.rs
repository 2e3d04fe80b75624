//! Optional process-wide scheduler.
//!
//! Engines that want a single pool for the whole process call
//! [`initialize`] once at startup and then use the free functions here. The
//! pool lives until the process exits. Code that needs several pools or a
//! deterministic shutdown should own a [`Scheduler`] instead.

use crate::config::SchedulerConfig;
use crate::context::Context;
use crate::error::{Result, SchedulerError};
use crate::job::JobArgs;
use crate::scheduler::{Handle, Scheduler};
use std::sync::OnceLock;

static GLOBAL: OnceLock<Scheduler> = OnceLock::new();

/// Starts the global scheduler with the default configuration.
pub fn initialize() -> Result<()> {
    initialize_with(SchedulerConfig::default())
}

/// Starts the global scheduler. A second call leaves the running pool alone
/// and returns [`SchedulerError::AlreadyInitialized`].
pub fn initialize_with(config: SchedulerConfig) -> Result<()> {
    if GLOBAL.get().is_some() {
        tracing::warn!("global scheduler initialized twice");
        return Err(SchedulerError::AlreadyInitialized);
    }

    // A racing initializer that loses has its pool dropped (and stopped) here.
    GLOBAL
        .set(Scheduler::new(config)?)
        .map_err(|_| SchedulerError::AlreadyInitialized)
}

pub fn is_initialized() -> bool {
    GLOBAL.get().is_some()
}

fn global() -> &'static Scheduler {
    match GLOBAL.get() {
        Some(scheduler) => scheduler,
        None => panic!("rustjob::global::initialize() must be called before submitting work"),
    }
}

/// Handle to the global scheduler, for capturing in tasks.
///
/// # Panics
/// If the global scheduler has not been initialized.
pub fn handle() -> Handle {
    global().handle()
}

/// Worker threads in the global pool, or 0 before initialization.
pub fn thread_count() -> usize {
    GLOBAL.get().map_or(0, |scheduler| scheduler.thread_count())
}

/// See [`Handle::execute`].
pub fn execute<F>(ctx: &Context, task: F)
where
    F: FnOnce(JobArgs) + Send + 'static,
{
    global().execute(ctx, task)
}

/// See [`Handle::dispatch`].
pub fn dispatch<F>(ctx: &Context, job_count: u32, group_size: u32, task: F) -> u32
where
    F: Fn(JobArgs) + Send + Sync + 'static,
{
    global().dispatch(ctx, job_count, group_size, task)
}

pub fn is_busy(ctx: &Context) -> bool {
    ctx.is_busy()
}

/// See [`Handle::wait`].
pub fn wait(ctx: &Context) {
    if ctx.is_busy() {
        global().wait(ctx)
    }
}
