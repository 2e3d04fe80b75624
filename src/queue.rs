//! Bounded lock-free MPMC ring buffer.
//!
//! Every worker owns one of these, but any thread may push into or pop from
//! any queue: submitters distribute round robin, and idle threads steal from
//! queues they do not own. The algorithm is Dmitry Vyukov's bounded MPMC
//! queue. Each slot carries a sequence number that tells producers and
//! consumers which lap of the ring the slot currently belongs to.

use crate::error::{Result, SchedulerError};
use crossbeam::utils::CachePadded;
use std::cell::UnsafeCell;
use std::cmp::Ordering as CmpOrdering;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Slot<T> {
    /// `pos` when free for the producer at `pos`, `pos + 1` once filled.
    sequence: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Fixed-capacity lock-free queue of pending work.
pub struct JobQueue<T> {
    buffer: Box<[Slot<T>]>,
    mask: usize,
    enqueue_pos: CachePadded<AtomicUsize>,
    dequeue_pos: CachePadded<AtomicUsize>,
}

// SAFETY: a slot's value is only touched by the single thread that won the
// CAS on the matching cursor, and the sequence release/acquire pair orders
// the write before the read.
unsafe impl<T: Send> Send for JobQueue<T> {}
unsafe impl<T: Send> Sync for JobQueue<T> {}

impl<T> JobQueue<T> {
    /// Creates an empty queue. `capacity` must be a power of two >= 2.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity < 2 || !capacity.is_power_of_two() {
            return Err(SchedulerError::InvalidQueueCapacity(capacity));
        }

        let buffer = (0..capacity)
            .map(|i| Slot {
                sequence: AtomicUsize::new(i),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();

        Ok(JobQueue {
            buffer,
            mask: capacity - 1,
            enqueue_pos: CachePadded::new(AtomicUsize::new(0)),
            dequeue_pos: CachePadded::new(AtomicUsize::new(0)),
        })
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Appends `value` at the back of the queue.
    ///
    /// Never blocks. When the queue is full the value is handed back in
    /// `Err` so the caller can run it some other way.
    pub fn push_back(&self, value: T) -> std::result::Result<(), T> {
        let mut pos = self.enqueue_pos.load(Ordering::Relaxed);
        loop {
            let slot = &self.buffer[pos & self.mask];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = (seq as isize).wrapping_sub(pos as isize);

            match diff.cmp(&0) {
                CmpOrdering::Equal => {
                    match self.enqueue_pos.compare_exchange_weak(
                        pos,
                        pos.wrapping_add(1),
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    ) {
                        Ok(_) => {
                            // SAFETY: winning the CAS grants exclusive access to
                            // this slot until the sequence is published.
                            unsafe { (*slot.value.get()).write(value) };
                            slot.sequence.store(pos.wrapping_add(1), Ordering::Release);
                            return Ok(());
                        }
                        Err(current) => pos = current,
                    }
                }
                // The slot still holds a value from the previous lap.
                CmpOrdering::Less => return Err(value),
                CmpOrdering::Greater => pos = self.enqueue_pos.load(Ordering::Relaxed),
            }
        }
    }

    /// Removes the value at the front of the queue, if one is ready.
    pub fn pop_front(&self) -> Option<T> {
        let mut pos = self.dequeue_pos.load(Ordering::Relaxed);
        loop {
            let slot = &self.buffer[pos & self.mask];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = (seq as isize).wrapping_sub(pos.wrapping_add(1) as isize);

            match diff.cmp(&0) {
                CmpOrdering::Equal => {
                    match self.dequeue_pos.compare_exchange_weak(
                        pos,
                        pos.wrapping_add(1),
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    ) {
                        Ok(_) => {
                            // SAFETY: sequence == pos + 1 means a producer
                            // finished writing, and the CAS makes us the only
                            // reader for this lap.
                            let value = unsafe { (*slot.value.get()).assume_init_read() };
                            slot.sequence
                                .store(pos.wrapping_add(self.buffer.len()), Ordering::Release);
                            return Some(value);
                        }
                        Err(current) => pos = current,
                    }
                }
                CmpOrdering::Less => return None,
                CmpOrdering::Greater => pos = self.dequeue_pos.load(Ordering::Relaxed),
            }
        }
    }

    /// Approximate number of queued values. Exact only when quiescent.
    pub fn len(&self) -> usize {
        let tail = self.enqueue_pos.load(Ordering::Relaxed);
        let head = self.dequeue_pos.load(Ordering::Relaxed);
        // A stale tail behind a fresh head reads as empty.
        tail.saturating_sub(head).min(self.capacity())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Drop for JobQueue<T> {
    fn drop(&mut self) {
        while self.pop_front().is_some() {}
    }
}
