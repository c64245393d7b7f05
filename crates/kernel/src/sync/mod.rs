//! Synchronization primitives.
//!
//! `critical` is the foundation every other primitive here is built on;
//! the rest are designed fresh atop `process::scheduler::{block, unblock}`
//! since `original_source/kernel/sync.c` is a `todo_noop()` stub with no
//! real semantics to port (see DESIGN.md).

pub mod barrier;
pub mod condvar;
pub mod critical;
pub mod lock;
pub mod mbox;
pub mod semaphore;
pub mod spinlock;

pub use barrier::Barrier;
pub use condvar::Condvar;
pub use critical::{critical, nointerrupt_count, nointerrupt_enter, nointerrupt_leave};
pub use lock::Lock;
pub use semaphore::Semaphore;
pub use spinlock::Spinlock;
