//! Condition variable.
//!
//! `wait` atomically releases the associated lock and blocks, re-acquiring
//! the lock before returning to the caller.
//! The "atomically" is provided by `nointerrupt`: the lock release and the
//! enqueue onto the wait queue happen with interrupts disabled, so no
//! signal can be delivered in between.

use crate::process::wait::WaitQueue;
use crate::sync::critical::critical;
use crate::sync::lock::Lock;

pub struct Condvar {
    waiters: WaitQueue,
}

impl Condvar {
    pub const fn new() -> Self {
        Self {
            waiters: WaitQueue::new(),
        }
    }

    pub fn wait(&mut self, lock: &mut Lock) {
        critical(|| {
            lock.release();
            self.waiters.wait();
        });
        lock.acquire();
    }

    pub fn signal(&mut self) {
        critical(|| {
            self.waiters.wake_one();
        });
    }

    pub fn broadcast(&mut self) {
        critical(|| {
            self.waiters.wake_all();
        });
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_on_empty_queue_is_noop() {
        let mut cv = Condvar::new();
        cv.signal();
        cv.broadcast();
    }
}
