//! Timed sleep.
//!
//! Grounded on `original_source/kernel/sleep.c`'s `msleep`: stamp the
//! wakeup tick, mark the task SLEEPING, and yield. The scheduler's dispatch
//! loop (`process::scheduler::run_dispatch_loop`) is what actually
//! transitions SLEEPING back to READY once `read_cpu_ticks()` passes the
//! stamped value.

use crate::arch::x86::tsc::{cpu_mhz, read_cpu_ticks};
use crate::process::task::{self, Status};
use crate::process::{current, scheduler};

/// Put the calling task to sleep for at least `msecs` milliseconds.
pub fn msleep(msecs: u32) {
    let cur = current::get().expect("msleep with no current task");
    let now = read_cpu_ticks();
    let ticks_per_ms = u64::from(cpu_mhz()) * 1000;
    task::with_pcb_mut(cur, |p| {
        p.wakeup_time = now + u64::from(msecs) * ticks_per_ms;
        p.status = Status::Sleeping;
    });
    scheduler::yield_cpu();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::task::{alloc_pcb, init_pcb_table, Kind};

    #[test]
    fn wakeup_time_is_in_the_future() {
        init_pcb_table();
        let idx = alloc_pcb(Kind::Thread, 0, 0).unwrap();
        let now = read_cpu_ticks();
        task::with_pcb_mut(idx, |p| {
            p.wakeup_time = now + 1000;
            p.status = Status::Sleeping;
        });
        task::with_pcb(idx, |p| assert!(p.wakeup_time > now));
        task::free_pcb(idx);
    }
}
