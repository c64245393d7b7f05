//! Syscall gate entry stub.
//!
//! Grounded on `original_source/kernel/syscall.c`'s `syscall_entry_interrupt`
//! (assembly): a DPL=3 interrupt gate at vector 48, reached via `int 0x30`
//! from ring 3. The stub itself just joins the same
//! common trap tail every exception/IRQ uses; `idt::common_trap_handler`
//! recognizes the syscall vector and routes to `crate::syscall::dispatch`.

use core::arch::naked_asm;

use crate::layout::IVEC_SYSCALL;

#[naked]
pub extern "C" fn syscall_stub() {
    unsafe {
        naked_asm!(
            "push 0",
            "push {vector}",
            "jmp {common}",
            vector = const IVEC_SYSCALL,
            common = sym super::idt::common_tail,
        )
    }
}
