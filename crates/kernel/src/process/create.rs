//! Task creation: kernel threads and user processes.
//!
//! `original_source/kernel/pcb.h` declares `create_thread(uintptr_t)` and
//! `create_process(uint32_t base, uint32_t size)`, but they are never
//! defined anywhere in `original_source` — filling them in is the
//! assignment the original course built around. This module gives both a
//! real body: allocate a PCB, carve out a kernel-stack slot from the fixed
//! `layout::THREAD_KSTACK_AREA_MIN..MAX` region, build the task's page
//! directory via `mm::pagetable`, and prepare the initial context so the
//! scheduler's first dispatch lands at the right trampoline
//! (`process::scheduler::kernel_thread_trampoline` /
//! `user_process_trampoline`).

use crate::arch::x86::context::prepare_first_time_stack;
use crate::layout::{THREAD_KSTACK_AREA_MAX, THREAD_KSTACK_AREA_MIN, THREAD_KSTACK_SIZE};
use crate::mm::pagetable;
use crate::process::scheduler::{kernel_thread_trampoline, user_process_trampoline};
use crate::process::task::{alloc_pcb, free_pcb, note_process_created, with_pcb_mut, Kind};
use crate::process::{current, queue};

/// How many kernel-stack slots the fixed thread-kernel-stack area holds.
/// Concurrently live tasks are bounded by this, not by `PCB_TABLE_SIZE`:
/// the area is 0x40000 bytes wide and each task reserves `THREAD_KSTACK_SIZE`
/// (0x2000) of it, giving 32 slots for a 128-entry PCB table.
pub const KSTACK_SLOTS: usize =
    (THREAD_KSTACK_AREA_MAX - THREAD_KSTACK_AREA_MIN) / THREAD_KSTACK_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateError {
    /// `task::alloc_pcb` found the 128-entry table full.
    NoFreePcb,
    /// Every one of the `KSTACK_SLOTS` kernel-stack slots is already
    /// claimed by a live task.
    NoKernelStackSlot,
}

fn kernel_stack_slot(idx: usize) -> Option<(u32, u32)> {
    if idx >= KSTACK_SLOTS {
        return None;
    }
    let base = THREAD_KSTACK_AREA_MIN as u32 + (idx as u32) * THREAD_KSTACK_SIZE as u32;
    let top = base + THREAD_KSTACK_SIZE as u32;
    Some((base, top))
}

/// Splice a freshly created, not-yet-run task into the ready ring, the way
/// `scheduler::unblock` splices a woken task back in.
fn enqueue_ready(idx: usize) {
    let mut ready = current::get();
    queue::queue_insert(&mut ready, idx);
    current::set(ready);
}

/// Create a kernel thread starting at `entry`, scheduled at `priority`.
/// Grounded on `create_thread(uintptr_t start_addr)`.
pub fn create_thread(entry: extern "C" fn() -> !, priority: i32) -> Result<usize, CreateError> {
    let idx = alloc_pcb(Kind::Thread, entry as u32, priority).ok_or(CreateError::NoFreePcb)?;
    let (base, top) = match kernel_stack_slot(idx) {
        Some(slot) => slot,
        None => {
            free_pcb(idx);
            return Err(CreateError::NoKernelStackSlot);
        }
    };

    let page_directory = pagetable::setup_task_vmem(true, 0, 0);
    let kernel_stack = prepare_first_time_stack(top, kernel_thread_trampoline);

    with_pcb_mut(idx, |p| {
        p.base_kernel_stack = base;
        p.kernel_stack = kernel_stack;
        p.page_directory = page_directory;
    });

    enqueue_ready(idx);
    Ok(idx)
}

/// Create a user process whose image occupies the physical range
/// `[base, base + limit)`. Grounded on
/// `create_process(uint32_t base, uint32_t size)`. Callers that need
/// admission control (the `loadproc` syscall, kernel-init process
/// bootstrap) run `mm::admission::admit` before calling this.
pub fn create_process(base: u32, limit: u32, priority: i32) -> Result<usize, CreateError> {
    let idx = alloc_pcb(Kind::Process, crate::layout::USER_VADDR as u32, priority)
        .ok_or(CreateError::NoFreePcb)?;
    let (kbase, ktop) = match kernel_stack_slot(idx) {
        Some(slot) => slot,
        None => {
            free_pcb(idx);
            return Err(CreateError::NoKernelStackSlot);
        }
    };

    let page_directory = pagetable::setup_task_vmem(false, base, limit);
    let kernel_stack = prepare_first_time_stack(ktop, user_process_trampoline);

    with_pcb_mut(idx, |p| {
        p.base_kernel_stack = kbase;
        p.kernel_stack = kernel_stack;
        p.page_directory = page_directory;
        p.base = base;
        p.limit = limit;
        p.user_stack = crate::layout::USER_STACK_TOP as u32;
    });

    note_process_created();
    enqueue_ready(idx);
    Ok(idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::task::init_pcb_table;

    extern "C" fn dummy_entry() -> ! {
        loop {}
    }

    #[test]
    fn kernel_stack_slots_fit_the_reserved_area() {
        assert_eq!(KSTACK_SLOTS, 32);
        let (base, top) = kernel_stack_slot(0).unwrap();
        assert_eq!(base, THREAD_KSTACK_AREA_MIN as u32);
        assert_eq!(top - base, THREAD_KSTACK_SIZE as u32);
        assert!(kernel_stack_slot(KSTACK_SLOTS).is_none());
    }

    #[test]
    fn create_thread_lands_in_ready_ring() {
        init_pcb_table();
        current::set(None);
        crate::mm::frame::init();
        crate::mm::pagetable::setup_kernel_vmem();

        let idx = create_thread(dummy_entry, 0).expect("room for one thread");
        assert_eq!(current::get(), Some(idx));

        free_pcb(idx);
        current::set(None);
    }
}
