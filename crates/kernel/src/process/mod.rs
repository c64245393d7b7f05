//! Process/thread management: PCB table, ready ring, scheduler.
//!
//! Grounded on `original_source/kernel/{pcb,scheduler}.{h,c}`, split into one
//! file per concern rather than the original's two large C files.

pub mod create;
pub mod current;
pub mod queue;
pub mod scheduler;
pub mod sleep;
pub mod task;
pub mod wait;

pub use create::{create_process, create_thread, CreateError};
pub use task::{Kind, Pcb, Status};
