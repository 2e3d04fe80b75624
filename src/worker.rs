//! Worker thread implementation.
//!
//! Each worker repeatedly runs one work pass over every queue (its own
//! first, then its neighbours), and parks on the pool's wake semaphore once
//! a pass comes up empty. Submissions release one permit per queued job.

use crate::config::{PinningStrategy, SchedulerConfig};
use crate::error::{Result, SchedulerError};
use crate::scheduler::Shared;
use std::cell::Cell;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};

thread_local! {
    /// `(pool address, worker id)` for threads owned by a scheduler.
    static CURRENT_WORKER: Cell<Option<(usize, usize)>> = const { Cell::new(None) };
}

/// Worker id of the calling thread if it belongs to the pool at `pool`.
pub(crate) fn current_worker_id(pool: &Shared) -> Option<usize> {
    let key = pool as *const Shared as usize;
    CURRENT_WORKER.with(|current| match current.get() {
        Some((owner, id)) if owner == key => Some(id),
        _ => None,
    })
}

/// A worker thread bound to one scheduler.
pub struct Worker {
    id: usize,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub(crate) fn spawn(id: usize, shared: Arc<Shared>, config: &SchedulerConfig) -> Result<Self> {
        let mut builder = thread::Builder::new().name(format!("{}{}", config.thread_name_prefix, id));
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let pinning = config.pinning;
        let handle = builder
            .spawn(move || {
                pin_current_thread(id, pinning);
                Worker::run_loop(id, shared);
            })
            .map_err(|source| SchedulerError::ThreadSpawn { index: id, source })?;

        Ok(Worker {
            id,
            handle: Some(handle),
        })
    }

    fn run_loop(id: usize, shared: Arc<Shared>) {
        let key = Arc::as_ptr(&shared) as usize;
        CURRENT_WORKER.with(|current| current.set(Some((key, id))));
        tracing::debug!(worker = id, "worker started");

        loop {
            shared.work(id);

            // Nothing left anywhere: sleep until a submission or shutdown.
            shared.wake.acquire();
            if shared.stop.load(Ordering::Acquire) {
                break;
            }
            shared.stats.worker_wakeups.fetch_add(1, Ordering::Relaxed);
        }

        CURRENT_WORKER.with(|current| current.set(None));
        tracing::debug!(worker = id, "worker exited");
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Waits for the worker thread to finish.
    pub fn join(mut self) -> thread::Result<()> {
        match self.handle.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }
}

fn pin_current_thread(id: usize, strategy: PinningStrategy) {
    let Some(target) = strategy.core_for(id) else {
        return;
    };

    let core = core_affinity::get_core_ids()
        .and_then(|cores| cores.into_iter().find(|core| core.id == target));

    match core {
        Some(core) if core_affinity::set_for_current(core) => {
            tracing::debug!(worker = id, core = target, "worker pinned");
        }
        Some(_) => tracing::warn!(worker = id, core = target, "failed to pin worker"),
        None => tracing::warn!(worker = id, core = target, "core not available, worker left unpinned"),
    }
}
