//! Counting semaphore used to park idle workers.

use parking_lot::{Condvar, Mutex};

/// Classic counting semaphore: `release` adds permits, `acquire` blocks
/// until one is available and consumes it.
#[derive(Debug, Default)]
pub struct Semaphore {
    permits: Mutex<usize>,
    cond: Condvar,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Semaphore {
            permits: Mutex::new(permits),
            cond: Condvar::new(),
        }
    }

    pub fn acquire(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.cond.wait(&mut permits);
        }
        *permits -= 1;
    }

    /// Takes a permit if one is available without blocking.
    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    pub fn release(&self, count: usize) {
        if count == 0 {
            return;
        }
        let mut permits = self.permits.lock();
        *permits += count;
        if count == 1 {
            self.cond.notify_one();
        } else {
            self.cond.notify_all();
        }
    }

    pub fn available(&self) -> usize {
        *self.permits.lock()
    }
}
