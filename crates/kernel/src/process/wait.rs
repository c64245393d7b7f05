//! Generic wait queues.
//!
//! A thin wrapper over `process::queue` and `process::scheduler::{block,
//! unblock}`, giving synchronization primitives (`sync::lock`,
//! `sync::condvar`, `sync::semaphore`, `sync::mbox`) a named type instead
//! of a bare `Option<usize>`. Grounded on the queue field every blocking
//! primitive in `original_source/kernel/sync.c`'s design keeps (each lock,
//! condvar and mailbox embeds one `pcb_t *blocked` queue head).

use crate::process::{queue, scheduler};

#[derive(Debug, Default)]
pub struct WaitQueue {
    head: Option<usize>,
}

impl WaitQueue {
    pub const fn new() -> Self {
        Self { head: None }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Block the calling task on this queue. Returns once woken by `wake_one`.
    pub fn wait(&mut self) {
        scheduler::block(&mut self.head);
    }

    /// Wake the longest-waiting task, if any. Returns whether a task was woken.
    pub fn wake_one(&mut self) -> bool {
        if self.head.is_none() {
            return false;
        }
        scheduler::unblock(&mut self.head);
        true
    }

    /// Wake every waiting task.
    pub fn wake_all(&mut self) {
        while self.wake_one() {}
    }

    /// Remove a specific task from the queue without waking it onto the
    /// ready ring (used by timeout paths that give up waiting).
    pub fn remove(&mut self, task: usize) {
        queue::queue_remove(&mut self.head, task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_queue_is_empty() {
        let q = WaitQueue::new();
        assert!(q.is_empty());
    }

    #[test]
    fn wake_one_on_empty_queue_is_noop() {
        let mut q = WaitQueue::new();
        assert!(!q.wake_one());
    }
}
