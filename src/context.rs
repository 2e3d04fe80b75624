//! Counter-based synchronization handle for batches of jobs.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

struct InnerContext {
    counter: AtomicU32,
    allow_work_on_main_thread: bool,
}

/// Tracks how many jobs submitted against it are still unfinished.
///
/// A `Context` is `Idle` while its counter is zero and `Busy` otherwise.
/// Every `execute`/`dispatch` raises the counter *before* the new jobs become
/// visible to any queue, and every job lowers it exactly once when it
/// finishes, so the counter can never underflow.
///
/// Cloning yields another handle to the same counter; queued jobs hold such
/// clones so the caller is free to drop its own handle early.
#[derive(Clone)]
pub struct Context {
    inner: Arc<InnerContext>,
}

impl Context {
    /// Creates an idle context whose waiter may help execute queued work.
    pub fn new() -> Self {
        Self::with_main_thread_work(true)
    }

    /// Creates an idle context with an explicit helper-work policy.
    ///
    /// With `allow == false`, a *worker* thread waiting on this context goes
    /// straight to sleep instead of draining queues first. Non-worker threads
    /// always help, otherwise a pool without workers could never finish.
    pub fn with_main_thread_work(allow: bool) -> Self {
        Context {
            inner: Arc::new(InnerContext {
                counter: AtomicU32::new(0),
                allow_work_on_main_thread: allow,
            }),
        }
    }

    /// Returns true while jobs submitted against this context are unfinished.
    pub fn is_busy(&self) -> bool {
        self.inner.counter.load(Ordering::Acquire) > 0
    }

    /// Number of jobs still outstanding.
    pub fn pending(&self) -> u32 {
        self.inner.counter.load(Ordering::Acquire)
    }

    pub fn allow_work_on_main_thread(&self) -> bool {
        self.inner.allow_work_on_main_thread
    }

    /// Returns true if both handles refer to the same counter.
    pub fn same_as(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn add(&self, jobs: u32) {
        self.inner.counter.fetch_add(jobs, Ordering::AcqRel);
    }

    /// Marks one job finished. Returns true if this brought the counter to zero.
    pub(crate) fn complete_one(&self) -> bool {
        let previous = self.inner.counter.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "context counter underflow");
        previous == 1
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("pending", &self.pending())
            .field("allow_work_on_main_thread", &self.allow_work_on_main_thread())
            .finish()
    }
}

/// Mutex + condition variable pair that blocked waiters sleep on.
///
/// Notification takes the lock first: a waiter checks its predicate while
/// holding the lock, so a counter reaching zero between that check and the
/// sleep cannot slip past unnoticed.
#[derive(Default)]
pub(crate) struct CompletionSignal {
    lock: Mutex<()>,
    cond: Condvar,
}

impl CompletionSignal {
    pub(crate) fn notify_all(&self) {
        let _guard = self.lock.lock();
        self.cond.notify_all();
    }

    /// Blocks until `ctx` is idle. No timeout.
    pub(crate) fn wait_idle(&self, ctx: &Context) {
        let mut guard = self.lock.lock();
        while ctx.is_busy() {
            self.cond.wait(&mut guard);
        }
    }
}
