//! Memory manager: frame pool, page tables, page faults, admission control.
//!
//! Grounded on `original_source/kernel/memory.{h,c}`, split across modules
//! by concern (frames, page tables, faults, admission) rather than kept as
//! one large `memory.c`.

pub mod admission;
pub mod eviction;
pub mod fault;
pub mod frame;
pub mod pagetable;

/// Initialize the frame pool and the kernel's own page directory. Must run
/// once during boot, before any task (kernel thread or user process) is
/// created.
pub fn init() {
    frame::init();
    pagetable::setup_kernel_vmem();
}
