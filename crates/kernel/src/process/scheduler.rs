//! Status-machine dispatch, yield/preempt/block/unblock/exit.
//!
//! Grounded on `original_source/kernel/scheduler.c`. The original splits
//! this across `scheduler()` (C, dispatch-loop bookkeeping), `dispatch()`
//! (assembly, restores hardware state) and `scheduler_entry()` (assembly,
//! saves the outgoing task and calls `scheduler()`). Here all three fold
//! into `scheduler_entry`, since `context::switch_to` already captures the
//! save/restore half that used to need its own asm routine.

use crate::arch::x86::{context, pic, tss};
use crate::mm::{frame, pagetable};
use crate::process::task::{Kind, Status};
use crate::process::{current, queue, task};
use crate::sync::critical::{nointerrupt_enter, nointerrupt_leave};

/// Restore hardware state for the task about to run: saved IRQ mask, page
/// directory, and (for processes) the kernel stack the TSS points at for
/// the next ring-3 -> ring-0 transition. Grounded on `setup_current_running`.
fn setup_current_running(idx: usize) {
    let (mask, page_directory, kind, base_kernel_stack) = task::with_pcb(idx, |p| {
        (p.int_controller_mask, p.page_directory, p.kind, p.base_kernel_stack)
    });
    pic::set_mask(mask);
    context::set_page_directory(page_directory);
    if matches!(kind, Kind::Process) {
        tss::set_kernel_stack(base_kernel_stack);
    }
}

/// The dispatch loop. Must run inside a `nointerrupt` region. Performs
/// ready-ring maintenance (downgrading SLEEPING to READY, reaping EXITED
/// PCBs) and returns the index of the task to run next. BLOCKED tasks are
/// never seen here: `block()` detaches them from the ready ring itself
/// before entering the scheduler. Faithful translation of `scheduler()`'s
/// `do { switch(...) } while`.
fn run_dispatch_loop() -> usize {
    let mut cur = current::get().expect("scheduler entered with no current task");

    loop {
        let status = task::with_pcb(cur, |p| p.status);
        match status {
            Status::Sleeping => {
                let wake = task::with_pcb(cur, |p| p.wakeup_time);
                if crate::arch::x86::tsc::read_cpu_ticks() >= wake {
                    task::with_pcb_mut(cur, |p| p.status = Status::Ready);
                }
                cur = task::with_pcb(cur, |p| p.next.expect("ring task has no next"));
            }
            Status::FirstTime | Status::Ready => {
                cur = task::with_pcb(cur, |p| p.next.expect("ring task has no next"));
            }
            Status::Blocked => {
                // `block()` already detaches the task from the ready ring
                // and splices it onto its wait queue before calling
                // `scheduler_entry`, so `current` never points at a BLOCKED
                // task by the time this loop inspects it.
                unreachable!("blocked task found in ready ring");
            }
            Status::Exited => {
                let mut q = Some(cur);
                let outgoing = queue::queue_shift(&mut q).expect("exited task missing from ring");
                reap(outgoing);
                cur = q.expect("no more jobs");
            }
        }

        let next_status = task::with_pcb(cur, |p| p.status);
        if next_status == Status::Ready || next_status == Status::FirstTime {
            break;
        }
    }

    current::set(Some(cur));
    cur
}

/// Free everything an EXITED task owned before its PCB slot is freed for
/// reuse. Per spec §4.7's EXITED case: "free page directory, free image
/// frames, free stacks, decrement running-process counter." Kernel-stack
/// slots need no separate free here: they are derived purely from the PCB
/// index (see `create::kernel_stack_slot`) and become available again the
/// moment `task::free_pcb` clears that index. Kernel threads all share the
/// one page directory `mm::pagetable::setup_kernel_vmem` built once at
/// boot, so only processes have per-task paging frames to reclaim.
fn reap(idx: usize) {
    let (kind, page_directory) = task::with_pcb(idx, |p| (p.kind, p.page_directory));

    if matches!(kind, Kind::Process) {
        let common_map_table = pagetable::dir_entry_table_paddr(page_directory, 0);
        let user_table =
            pagetable::dir_entry_table_paddr(page_directory, crate::layout::USER_VADDR as u32);
        frame::free_frame(common_map_table as usize);
        frame::free_frame(user_table as usize);
        frame::free_frame(page_directory as usize);
        frame::free_owned_by(idx);
        task::note_process_reaped();
    }

    task::free_pcb(idx);
}

/// Save `prev`'s context, enter the scheduler to pick the next task, and
/// switch to it. Returns once some future reschedule switches back to
/// `prev`'s own stack.
///
/// `prev` is taken explicitly rather than read from `current` here: `block`
/// already moves `current` to the next ready task before calling in (it has
/// to, so `run_dispatch_loop` walks the ring starting from the right place),
/// so by the time this runs `current` no longer names the outgoing task.
fn scheduler_entry(prev: usize) {
    nointerrupt_enter();

    task::with_pcb_mut(prev, |p| p.int_controller_mask = pic::get_mask());

    let next = run_dispatch_loop();
    setup_current_running(next);

    let old_esp_ptr = task::kernel_stack_ptr(prev);
    let new_esp = task::with_pcb(next, |p| p.kernel_stack);
    unsafe {
        context::switch_to(old_esp_ptr, new_esp);
    }

    nointerrupt_leave();
}

pub fn yield_cpu() {
    nointerrupt_enter();
    let cur = current::get().expect("yield with no current task");
    task::with_pcb_mut(cur, |p| p.yield_count += 1);
    scheduler_entry(cur);
    nointerrupt_leave();
}

/// Called from the timer IRQ handler. Caller has already sent EOI.
pub fn preempt() {
    nointerrupt_enter();
    let cur = current::get().expect("preempt with no current task");
    task::with_pcb_mut(cur, |p| p.preempt_count += 1);
    scheduler_entry(cur);
    nointerrupt_leave();
}

/// Remove the current task from the ready ring and insert it into `q`.
///
/// `cur` is the ready ring's head (see `current.rs`), so its `next`/
/// `previous` fields are still its ready-ring links on entry. It must be
/// detached from that ring before `queue_insert` overwrites those same
/// fields with wait-queue links; a task's link pair names membership in
/// exactly one ring at a time. Mirrors the detach-then-enqueue ordering of
/// `original_source/kernel/scheduler.c`'s `block`. `current` is advanced to
/// the remaining ring here (not left pointing at `cur`) so
/// `run_dispatch_loop` starts its walk from a task that is actually still in
/// the ready ring; `cur` itself is passed to `scheduler_entry` directly so
/// its context still gets saved correctly.
pub fn block(q: &mut Option<usize>) {
    nointerrupt_enter();
    let cur = current::get().expect("block with no current task");
    task::with_pcb_mut(cur, |p| p.status = Status::Blocked);

    let mut ring = Some(cur);
    queue::queue_shift(&mut ring);
    current::set(Some(ring.expect("no more jobs")));

    queue::queue_insert(q, cur);

    scheduler_entry(cur);
    nointerrupt_leave();
}

/// Move the head of `q` into the ready ring.
pub fn unblock(q: &mut Option<usize>) {
    nointerrupt_enter();
    let job = queue::queue_shift(q).expect("unblock on empty queue");
    task::with_pcb_mut(job, |p| p.status = Status::Ready);

    let mut ready = current::get();
    queue::queue_insert(&mut ready, job);
    current::set(ready);

    nointerrupt_leave();
}

/// Terminate the calling task. Never returns.
pub fn exit_task() -> ! {
    nointerrupt_enter();
    let cur = current::get().expect("exit with no current task");
    task::with_pcb_mut(cur, |p| p.status = Status::Exited);

    if matches!(task::with_pcb(cur, |p| p.kind), Kind::Process) {
        crate::debug!("process {} exited", task::with_pcb(cur, |p| p.pid));
    }

    scheduler_entry(cur);
    unreachable!("control returned to exited task");
}

pub fn getpriority() -> i32 {
    let cur = current::get().expect("getpriority with no current task");
    task::with_pcb(cur, |p| p.priority)
}

pub fn setpriority(priority: i32) {
    let cur = current::get().expect("setpriority with no current task");
    task::with_pcb_mut(cur, |p| p.priority = priority);
}

pub fn getpid() -> u32 {
    current::current_pid()
}

/// The entry trampoline every freshly prepared kernel-stack `ret`s into the
/// first time a task is dispatched. Leaves the `nointerrupt` region
/// `scheduler_entry` was inside when this task was chosen (mirrors "the
/// initial dispatch path jumps to the task's start address"), then jumps
/// to the task's start address.
pub extern "C" fn kernel_thread_trampoline() -> ! {
    nointerrupt_leave();
    let cur = current::get().expect("trampoline with no current task");
    let start_pc = task::with_pcb(cur, |p| p.start_pc);
    let entry: extern "C" fn() -> ! = unsafe { core::mem::transmute(start_pc as usize) };
    entry()
}

/// Entry trampoline for user processes: drops to ring 3 via `iret` instead
/// of calling directly, since kernel code cannot just `call` into
/// unprivileged code.
pub extern "C" fn user_process_trampoline() -> ! {
    nointerrupt_leave();
    let cur = current::get().expect("trampoline with no current task");
    let (start_pc, user_stack) = task::with_pcb(cur, |p| (p.start_pc, p.user_stack));
    let user_cs = crate::arch::x86::gdt::user_code_selector().bits() as u32;
    let user_ds = crate::arch::x86::gdt::user_data_selector().bits() as u32;
    unsafe {
        core::arch::asm!(
            "mov ax, {ds:x}",
            "mov ds, ax",
            "mov es, ax",
            "mov fs, ax",
            "mov gs, ax",
            "push {ds:e}",       // user ss
            "push {sp:e}",       // user esp
            "pushfd",            // eflags
            "push {cs:e}",       // user cs
            "push {pc:e}",       // user eip
            "iretd",
            ds = in(reg) user_ds,
            sp = in(reg) user_stack,
            cs = in(reg) user_cs,
            pc = in(reg) start_pc,
            options(noreturn),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::task::{alloc_pcb, init_pcb_table};

    #[test]
    fn priority_roundtrip() {
        init_pcb_table();
        let idx = alloc_pcb(Kind::Thread, 0, 5).unwrap();
        current::set(Some(idx));
        assert_eq!(getpriority(), 5);
        setpriority(9);
        assert_eq!(getpriority(), 9);
        current::set(None);
        task::free_pcb(idx);
    }
}
