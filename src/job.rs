//! Job definitions and execution logic.
//!
//! A job is one schedulable unit: a task closure, the [`Context`] it reports
//! to, and the half-open index range `[offset, end)` it iterates.

use crate::context::{CompletionSignal, Context};
use std::any::Any;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Arguments passed to a task for each index it processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobArgs {
    /// Index within the whole dispatch, `0..job_count`.
    pub job_index: u32,
    /// Which group (job) of the dispatch this index belongs to.
    pub group_id: u32,
    /// Index relative to the start of the group.
    pub group_index: u32,
    pub is_first_job_in_group: bool,
    pub is_last_job_in_group: bool,
}

/// Task shared by every group of a single dispatch.
pub(crate) type GroupTask = Arc<dyn Fn(JobArgs) + Send + Sync + 'static>;

pub(crate) enum Task {
    /// Move-only closure from `execute`; runs exactly once.
    Single(Box<dyn FnOnce(JobArgs) + Send + 'static>),
    Group(GroupTask),
}

/// A unit of work sitting in a queue.
pub struct Job {
    task: Task,
    ctx: Context,
    group_id: u32,
    offset: u32,
    end: u32,
}

impl Job {
    /// A one-index job in the range `[0, 1)`.
    pub(crate) fn single<F>(ctx: Context, work: F) -> Self
    where
        F: FnOnce(JobArgs) + Send + 'static,
    {
        Job {
            task: Task::Single(Box::new(work)),
            ctx,
            group_id: 0,
            offset: 0,
            end: 1,
        }
    }

    pub(crate) fn group(ctx: Context, task: GroupTask, group_id: u32, range: Range<u32>) -> Self {
        debug_assert!(range.start < range.end, "empty job range");
        Job {
            task: Task::Group(task),
            ctx,
            group_id,
            offset: range.start,
            end: range.end,
        }
    }

    pub fn range(&self) -> Range<u32> {
        self.offset..self.end
    }

    pub fn group_id(&self) -> u32 {
        self.group_id
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Runs the task over the job's range, then retires the job.
    ///
    /// Indices run in increasing order on the calling thread. A panic in the
    /// task stops the remaining indices of this job only; the context is
    /// decremented either way. Returns false if the task panicked.
    pub(crate) fn execute(self, signal: &CompletionSignal) -> bool {
        let Job {
            task,
            ctx,
            group_id,
            offset,
            end,
        } = self;

        let result = panic::catch_unwind(AssertUnwindSafe(move || match task {
            Task::Single(work) => work(job_args(offset, end, group_id, offset)),
            Task::Group(work) => {
                for i in offset..end {
                    work(job_args(offset, end, group_id, i));
                }
            }
        }));

        if let Err(payload) = &result {
            tracing::error!(
                group_id,
                offset,
                end,
                "task panicked: {}",
                panic_message(&**payload)
            );
        }

        if ctx.complete_one() {
            signal.notify_all();
        }

        result.is_ok()
    }
}

fn job_args(offset: u32, end: u32, group_id: u32, i: u32) -> JobArgs {
    JobArgs {
        job_index: i,
        group_id,
        group_index: i - offset,
        is_first_job_in_group: i == offset,
        is_last_job_in_group: i == end - 1,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

/// Number of groups a dispatch of `job_count` indices in `group_size` chunks
/// produces (rounded up). Zero for degenerate arguments.
pub fn dispatch_group_count(job_count: u32, group_size: u32) -> u32 {
    if job_count == 0 || group_size == 0 {
        return 0;
    }
    job_count.div_ceil(group_size)
}

/// Index range covered by group `group_id`.
pub fn group_range(group_id: u32, job_count: u32, group_size: u32) -> Range<u32> {
    let offset = group_id * group_size;
    offset..offset.saturating_add(group_size).min(job_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_single_job_runs_once() {
        let signal = CompletionSignal::default();
        let ctx = Context::new();
        let executed = Arc::new(AtomicBool::new(false));
        let executed_clone = executed.clone();

        ctx.add(1);
        let job = Job::single(ctx.clone(), move |args| {
            assert_eq!(args.job_index, 0);
            assert!(args.is_first_job_in_group && args.is_last_job_in_group);
            executed_clone.store(true, Ordering::SeqCst);
        });
        assert_eq!(job.range(), 0..1);

        assert!(job.execute(&signal));
        assert!(executed.load(Ordering::SeqCst));
        assert!(!ctx.is_busy());
    }

    #[test]
    fn test_group_job_iterates_in_order() {
        let signal = CompletionSignal::default();
        let ctx = Context::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        ctx.add(1);
        let task: GroupTask = Arc::new(move |args: JobArgs| seen_clone.lock().push(args));
        Job::group(ctx.clone(), task, 2, 4..7).execute(&signal);

        let seen = seen.lock();
        let indices: Vec<u32> = seen.iter().map(|a| a.job_index).collect();
        assert_eq!(indices, vec![4, 5, 6]);
        assert!(seen.iter().all(|a| a.group_id == 2));
        assert_eq!(seen[0].group_index, 0);
        assert_eq!(seen[2].group_index, 2);
        assert!(seen[0].is_first_job_in_group && !seen[0].is_last_job_in_group);
        assert!(!seen[1].is_first_job_in_group && !seen[1].is_last_job_in_group);
        assert!(seen[2].is_last_job_in_group);
    }

    #[test]
    fn test_panicking_job_still_completes() {
        let signal = CompletionSignal::default();
        let ctx = Context::new();
        ctx.add(1);

        let ok = Job::single(ctx.clone(), |_| panic!("boom")).execute(&signal);
        assert!(!ok);
        assert!(!ctx.is_busy());
    }

    #[test]
    fn test_group_count() {
        assert_eq!(dispatch_group_count(0, 4), 0);
        assert_eq!(dispatch_group_count(4, 0), 0);
        assert_eq!(dispatch_group_count(6, 2), 3);
        assert_eq!(dispatch_group_count(7, 2), 4);
        assert_eq!(dispatch_group_count(1, 64), 1);
        assert_eq!(dispatch_group_count(u32::MAX, 1), u32::MAX);
    }

    #[test]
    fn test_group_ranges_partition_indices() {
        for (job_count, group_size) in [(1, 1), (6, 2), (7, 3), (100, 7), (5, 100)] {
            let groups = dispatch_group_count(job_count, group_size);
            let mut next = 0;
            for g in 0..groups {
                let r = group_range(g, job_count, group_size);
                assert_eq!(r.start, next);
                assert!(r.end > r.start);
                next = r.end;
            }
            assert_eq!(next, job_count);
        }
    }
}
