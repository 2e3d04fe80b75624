//! Parallel iteration over slices, built on scoped dispatch.
//!
//! Each element index is a job index; elements are handed out in groups so
//! that one group is processed sequentially by a single thread. Job indices
//! are `u32`, so slices longer than `u32::MAX` are dispatched in consecutive
//! chunks and [`JobArgs`] is relative to the chunk.

use crate::job::JobArgs;
use crate::scheduler::Handle;

/// Raw view of a mutable slice that can be shared across jobs.
struct UnsafeSlice<T> {
    ptr: *mut T,
    len: usize,
}

// SAFETY: jobs only touch disjoint indices, enforced by dispatch handing out
// each index exactly once.
unsafe impl<T: Send> Send for UnsafeSlice<T> {}
unsafe impl<T: Send> Sync for UnsafeSlice<T> {}

impl<T> UnsafeSlice<T> {
    fn new(slice: &mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
        }
    }

    /// # Safety
    /// No other reference to element `index` may be live.
    #[allow(clippy::mut_from_ref)]
    unsafe fn get_mut(&self, index: usize) -> &mut T {
        assert!(index < self.len);
        unsafe { &mut *self.ptr.add(index) }
    }
}

pub trait ParallelSlice<T> {
    fn par_iter<'a>(&'a self, handle: &'a Handle) -> ParallelIter<'a, T>;
}

pub trait ParallelSliceMut<T> {
    fn par_iter_mut<'a>(&'a mut self, handle: &'a Handle) -> ParallelIterMut<'a, T>;
}

impl<T: Sync> ParallelSlice<T> for [T] {
    fn par_iter<'a>(&'a self, handle: &'a Handle) -> ParallelIter<'a, T> {
        ParallelIter {
            slice: self,
            handle,
            group_size: None,
        }
    }
}

impl<T: Send> ParallelSliceMut<T> for [T] {
    fn par_iter_mut<'a>(&'a mut self, handle: &'a Handle) -> ParallelIterMut<'a, T> {
        ParallelIterMut {
            slice: self,
            handle,
            group_size: None,
        }
    }
}

/// Largest element count handed to a single dispatch.
const MAX_DISPATCH_LEN: usize = u32::MAX as usize;

/// Group size used when the caller does not pick one: roughly four groups
/// per queue so stealing has something to balance.
fn auto_group_size(len: usize, queues: usize) -> u32 {
    let target_groups = (queues * 4).max(1);
    u32::try_from(len.div_ceil(target_groups).max(1)).unwrap_or(u32::MAX)
}

/// Calls `op(element_index, args)` for every index in `0..len`, one blocking
/// dispatch per chunk of at most `max_chunk` elements.
fn dispatch_chunked<F>(
    handle: &Handle,
    len: usize,
    max_chunk: usize,
    group_size: Option<u32>,
    op: &F,
) where
    F: Fn(usize, JobArgs) + Sync,
{
    debug_assert!(max_chunk > 0 && max_chunk <= MAX_DISPATCH_LEN);
    let mut base = 0;
    while base < len {
        let chunk = (len - base).min(max_chunk);
        let job_count = u32::try_from(chunk).unwrap_or(u32::MAX);
        let group_size =
            group_size.unwrap_or_else(|| auto_group_size(chunk, handle.queue_count()));
        handle.scope_dispatch(job_count, group_size, move |args| {
            op(base + args.job_index as usize, args)
        });
        base += chunk;
    }
}

pub struct ParallelIter<'a, T> {
    slice: &'a [T],
    handle: &'a Handle,
    group_size: Option<u32>,
}

impl<'a, T: Sync> ParallelIter<'a, T> {
    pub fn group_size(mut self, group_size: u32) -> Self {
        self.group_size = Some(group_size);
        self
    }

    /// Calls `op` on every element and returns once all calls are done.
    pub fn for_each<F>(self, op: F)
    where
        F: Fn(&T) + Sync + Send,
    {
        self.for_each_with_args(|item, _| op(item))
    }

    /// Like [`ParallelIter::for_each`], also passing the job arguments.
    pub fn for_each_with_args<F>(self, op: F)
    where
        F: Fn(&T, JobArgs) + Sync + Send,
    {
        let slice = self.slice;
        dispatch_chunked(
            self.handle,
            slice.len(),
            MAX_DISPATCH_LEN,
            self.group_size,
            &|index, args| op(&slice[index], args),
        );
    }
}

pub struct ParallelIterMut<'a, T> {
    slice: &'a mut [T],
    handle: &'a Handle,
    group_size: Option<u32>,
}

impl<'a, T: Send> ParallelIterMut<'a, T> {
    pub fn group_size(mut self, group_size: u32) -> Self {
        self.group_size = Some(group_size);
        self
    }

    pub fn for_each<F>(self, op: F)
    where
        F: Fn(&mut T) + Sync + Send,
    {
        self.for_each_with_args(|item, _| op(item))
    }

    pub fn for_each_with_args<F>(self, op: F)
    where
        F: Fn(&mut T, JobArgs) + Sync + Send,
    {
        let len = self.slice.len();
        let slice = UnsafeSlice::new(self.slice);

        dispatch_chunked(
            self.handle,
            len,
            MAX_DISPATCH_LEN,
            self.group_size,
            &|index, args| {
                // SAFETY: chunks are disjoint and each index within a chunk
                // is visited exactly once.
                let item = unsafe { slice.get_mut(index) };
                op(item, args)
            },
        );
    }
}
