//! Counting semaphore.
//!
//! Down blocks when the counter is zero; up hands off directly to a waiter
//! (counter left unchanged) rather than
//! incrementing and letting the waiter re-check, for the same starvation
//! reason as `sync::lock`'s hand-off release.

use crate::process::wait::WaitQueue;
use crate::sync::critical::critical;

pub struct Semaphore {
    count: i32,
    waiters: WaitQueue,
}

impl Semaphore {
    pub const fn new(initial: i32) -> Self {
        Self {
            count: initial,
            waiters: WaitQueue::new(),
        }
    }

    pub fn down(&mut self) {
        critical(|| {
            if self.count > 0 {
                self.count -= 1;
            } else {
                self.waiters.wait();
            }
        });
    }

    pub fn up(&mut self) {
        critical(|| {
            if !self.waiters.is_empty() {
                self.waiters.wake_one();
            } else {
                self.count += 1;
            }
        });
    }

    pub fn count(&self) -> i32 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn down_decrements_positive_counter() {
        let mut s = Semaphore::new(2);
        s.down();
        assert_eq!(s.count(), 1);
        s.down();
        assert_eq!(s.count(), 0);
    }

    #[test]
    fn up_on_no_waiters_increments() {
        let mut s = Semaphore::new(0);
        s.up();
        assert_eq!(s.count(), 1);
    }
}
