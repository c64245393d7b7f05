//! The `nointerrupt` critical section.
//!
//! Grounded on `sync.h`'s `nointerrupt_enter`/`nointerrupt_leave`/
//! `nointerrupt_count` (there declared `ATTR_EASY_ASM_CALL`, implemented in
//! assembly in the original; here a nesting counter plus `cli`/`sti` is
//! enough since there is only one CPU). Every mutation of
//! the ready ring, wait queues, PCB status fields, and page-table
//! structures happens inside one of these regions.

use core::sync::atomic::{AtomicU32, Ordering};

static DEPTH: AtomicU32 = AtomicU32::new(0);

/// Disable interrupts and bump the nesting counter. Safe to call from
/// within an already-disabled region.
pub fn nointerrupt_enter() {
    crate::arch::x86::cpu::disable_interrupts();
    DEPTH.fetch_add(1, Ordering::SeqCst);
}

/// Decrement the nesting counter; re-enable interrupts only when it
/// returns to zero.
pub fn nointerrupt_leave() {
    let prev = DEPTH.fetch_sub(1, Ordering::SeqCst);
    debug_assert!(prev > 0, "nointerrupt_leave without matching enter");
    if prev == 1 {
        crate::arch::x86::cpu::enable_interrupts();
    }
}

pub fn nointerrupt_count() -> u32 {
    DEPTH.load(Ordering::SeqCst)
}

/// Run `f` inside a `nointerrupt` region, leaving it again on return.
pub fn critical<R>(f: impl FnOnce() -> R) -> R {
    nointerrupt_enter();
    let r = f();
    nointerrupt_leave();
    r
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nesting_tracks_depth() {
        assert_eq!(nointerrupt_count(), 0);
        nointerrupt_enter();
        nointerrupt_enter();
        assert_eq!(nointerrupt_count(), 2);
        nointerrupt_leave();
        assert_eq!(nointerrupt_count(), 1);
        nointerrupt_leave();
        assert_eq!(nointerrupt_count(), 0);
    }
}
