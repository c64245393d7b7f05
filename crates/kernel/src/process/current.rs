//! The "current running" singleton.
//!
//! `original_source/scheduler.c` holds `current_running` as a bare global
//! `pcb_t *`: it simultaneously names the task presently executing and
//! serves as the ready ring's head pointer (`dispatch()` always runs the
//! head). We keep both roles on one `Option<usize>` table index: genuinely
//! global state, appropriate for a single-core kernel with one ready ring.

use spin::Mutex;

static CURRENT_RUNNING: Mutex<Option<usize>> = Mutex::new(None);

pub fn get() -> Option<usize> {
    *CURRENT_RUNNING.lock()
}

pub fn set(idx: Option<usize>) {
    *CURRENT_RUNNING.lock() = idx;
}

/// PID of the current task, or 0 if none is running yet (pre-scheduler boot).
pub fn current_pid() -> u32 {
    match get() {
        Some(idx) => crate::process::task::with_pcb(idx, |p| p.pid),
        None => 0,
    }
}

/// Nested-interrupt depth of the current task, for panic/exception dumps.
pub fn nested_depth() -> u32 {
    match get() {
        Some(idx) => crate::process::task::with_pcb(idx, |p| p.nested_count),
        None => 0,
    }
}
