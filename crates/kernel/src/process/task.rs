//! Task descriptor (PCB) and the fixed-capacity task table.
//!
//! Grounded on `pcb.h`/`pcb.c`: same fields, same fixed 128-entry table.
//! Queue membership is the one deliberate departure — the original embeds
//! `next`/`previous` pointers directly in the struct and builds a genuine
//! doubly-linked ring of PCBs; here each task is a slot in `TASKS` and
//! queues are rings of table indices (see `process::queue`): tasks as
//! elements of a fixed pre-allocated table indexed by a small integer.

use spin::Mutex;

use crate::layout::PCB_TABLE_SIZE;

/// Status machine states. `original_source`'s C enum omits `SLEEPING` even
/// though `scheduler.c`'s dispatch loop handles it; it gets a real
/// discriminant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Status {
    FirstTime = 0,
    Ready = 1,
    Blocked = 2,
    Sleeping = 3,
    Exited = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Kind {
    Thread = 0,
    Process = 1,
}

/// Process/thread control block. Fields map 1:1 onto `struct pcb`, except
/// `next`/`previous` which become `Option<usize>` table indices.
#[derive(Debug, Clone, Copy)]
pub struct Pcb {
    pub in_use: bool,
    pub next: Option<usize>,
    pub previous: Option<usize>,

    pub pid: u32,
    pub kind: Kind,
    pub start_pc: u32,
    pub status: Status,
    pub user_stack: u32,
    pub kernel_stack: u32,

    pub priority: i32,

    /// Nesting depth of interrupts taken while running this task. 0: user
    /// mode; 1: kernel mode; 2: was in kernel mode when interrupted again.
    pub nested_count: u32,
    pub preempt_count: u32,
    pub yield_count: u32,

    pub base_kernel_stack: u32,
    pub ds: u32,
    pub cs: u32,
    pub int_controller_mask: u16,

    /// Absolute `read_cpu_ticks()` value at which a SLEEPING task becomes
    /// READY again.
    pub wakeup_time: u64,

    pub page_directory: u32,
    pub base: u32,
    pub limit: u32,
}

impl Pcb {
    const fn empty() -> Self {
        Self {
            in_use: false,
            next: None,
            previous: None,
            pid: 0,
            kind: Kind::Thread,
            start_pc: 0,
            status: Status::Exited,
            user_stack: 0,
            kernel_stack: 0,
            priority: 0,
            nested_count: 0,
            preempt_count: 0,
            yield_count: 0,
            base_kernel_stack: 0,
            ds: 0,
            cs: 0,
            int_controller_mask: 0,
            wakeup_time: 0,
            page_directory: 0,
            base: 0,
            limit: 0,
        }
    }
}

pub struct PcbTable {
    entries: [Pcb; PCB_TABLE_SIZE],
}

impl PcbTable {
    const fn new() -> Self {
        Self {
            entries: [Pcb::empty(); PCB_TABLE_SIZE],
        }
    }
}

static TABLE: Mutex<PcbTable> = Mutex::new(PcbTable::new());
static NEXT_PID: core::sync::atomic::AtomicU32 = core::sync::atomic::AtomicU32::new(1);

/// Count of live (not yet reaped) user processes. Grounded on
/// `original_source/kernel/scheduler.c`'s bare `uint32_t running_processes`
/// global, which `exit()` decrements; here the decrement happens in
/// `process::scheduler`'s reap path, once a process's resources are
/// actually freed rather than merely marked EXITED.
static RUNNING_PROCESSES: core::sync::atomic::AtomicU32 = core::sync::atomic::AtomicU32::new(0);

pub fn running_processes() -> u32 {
    RUNNING_PROCESSES.load(core::sync::atomic::Ordering::Relaxed)
}

pub fn note_process_created() {
    RUNNING_PROCESSES.fetch_add(1, core::sync::atomic::Ordering::Relaxed);
}

pub fn note_process_reaped() {
    RUNNING_PROCESSES.fetch_sub(1, core::sync::atomic::Ordering::Relaxed);
}

/// Reset the table to all-free. Called once at boot.
pub fn init_pcb_table() {
    let mut t = TABLE.lock();
    for entry in t.entries.iter_mut() {
        *entry = Pcb::empty();
    }
}

/// Allocate a free PCB slot, returning its table index. `None` if the
/// table is full.
pub fn alloc_pcb(kind: Kind, start_pc: u32, priority: i32) -> Option<usize> {
    let mut t = TABLE.lock();
    let idx = t.entries.iter().position(|p| !p.in_use)?;
    let pid = NEXT_PID.fetch_add(1, core::sync::atomic::Ordering::Relaxed);
    t.entries[idx] = Pcb {
        in_use: true,
        pid,
        kind,
        start_pc,
        status: Status::FirstTime,
        priority,
        ..Pcb::empty()
    };
    Some(idx)
}

/// Mark a PCB slot free again. Caller must have already removed it from
/// every queue (see `process::scheduler::scheduler`'s EXITED case).
pub fn free_pcb(idx: usize) {
    let mut t = TABLE.lock();
    t.entries[idx] = Pcb::empty();
}

pub fn with_pcb<R>(idx: usize, f: impl FnOnce(&Pcb) -> R) -> R {
    let t = TABLE.lock();
    f(&t.entries[idx])
}

pub fn with_pcb_mut<R>(idx: usize, f: impl FnOnce(&mut Pcb) -> R) -> R {
    let mut t = TABLE.lock();
    f(&mut t.entries[idx])
}

/// Raw pointer to a slot's `kernel_stack` field, for `context::switch_to`
/// to write the outgoing `esp` into directly. `TABLE` is a `'static` array,
/// so the address is stable regardless of whether the lock is held while
/// the pointer is later dereferenced; callers must only use this from a
/// `nointerrupt` region on the single CPU this kernel runs on.
pub fn kernel_stack_ptr(idx: usize) -> *mut u32 {
    let mut t = TABLE.lock();
    core::ptr::addr_of_mut!(t.entries[idx].kernel_stack)
}

/// Log id/status/priority for every live task. `original_source/pcb.c`'s
/// `print_pcb_table` is a `todo_noop()`; we implement it for real as a
/// debug-only diagnostic.
#[cfg(debug_assertions)]
pub fn debug_dump_tasks() {
    let t = TABLE.lock();
    for (idx, p) in t.entries.iter().enumerate() {
        if p.in_use {
            crate::debug!(
                "pcb[{}] pid={} status={:?} priority={} nested={}",
                idx, p.pid, p.status, p.priority, p.nested_count
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_free_roundtrip() {
        init_pcb_table();
        let idx = alloc_pcb(Kind::Thread, 0x1000, 0).expect("table should have room");
        with_pcb(idx, |p| assert_eq!(p.status, Status::FirstTime));
        free_pcb(idx);
        with_pcb(idx, |p| assert!(!p.in_use));
    }

    #[test]
    fn table_exhaustion_returns_none() {
        init_pcb_table();
        let mut allocated = alloc::vec::Vec::new();
        for _ in 0..PCB_TABLE_SIZE {
            allocated.push(alloc_pcb(Kind::Thread, 0, 0).unwrap());
        }
        assert!(alloc_pcb(Kind::Thread, 0, 0).is_none());
        for idx in allocated {
            free_pcb(idx);
        }
    }
}
