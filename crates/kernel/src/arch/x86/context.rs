//! Low-level context switch.
//!
//! Save/restore written in inline assembly, with the saved frame a plain
//! record, matching `original_source`'s `scheduler_asm.S` convention: rather
//! than saving every register in a
//! `CpuContext` struct, only the callee-saved set is pushed onto the
//! outgoing task's own kernel stack, and the stack pointer itself
//! (`pcb.kernel_stack`) is the saved/restored quantity. This is the
//! classic "stack-switch" context switch (also used by pintos/JOS),
//! chosen over a struct-based `CpuContext` because it composes directly
//! with the interrupt trampolines in `idt.rs`, which already leave a full
//! register frame on the stack when entering through a hardware interrupt.

use core::arch::{asm, naked_asm};

/// Callee-saved registers per the System V i386 ABI: `ebx`, `esi`, `edi`,
/// `ebp`. `esp` and `eip` are implicit in the stack-switch itself.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuContext {
    pub ebx: u32,
    pub esi: u32,
    pub edi: u32,
    pub ebp: u32,
}

/// Save the four callee-saved registers and the stack pointer into
/// `*old_esp`, then load `new_esp` and restore its callee-saved registers.
/// Returns (as a normal function return) once some future `switch_to` call
/// switches back to the caller's stack.
///
/// # Safety
/// `new_esp` must point at a stack prepared either by a previous call to
/// `switch_to` (mid-task) or by `prepare_first_time_stack` (never-run
/// task). `old_esp` must be a valid place to store the outgoing esp.
#[naked]
pub unsafe extern "C" fn switch_to(old_esp: *mut u32, new_esp: u32) {
    naked_asm!(
        "push ebp",
        "push edi",
        "push esi",
        "push ebx",
        "mov eax, [esp + 20]", // old_esp (first arg, after 4 pushes + return addr)
        "mov [eax], esp",
        "mov esp, [esp + 24]", // new_esp (second arg)
        "pop ebx",
        "pop esi",
        "pop edi",
        "pop ebp",
        "ret",
    )
}

/// Build a fresh kernel stack for a task that has never run, so that the
/// very first `switch_to` into it "returns" into `entry` instead of a real
/// caller. Pushes a fake callee-saved frame (zeroed) under a return address
/// of `entry`, matching what `switch_to`'s epilogue expects to pop.
///
/// Returns the resulting stack pointer to store in `pcb.kernel_stack`.
pub fn prepare_first_time_stack(stack_top: u32, entry: extern "C" fn() -> !) -> u32 {
    unsafe {
        let mut sp = stack_top as *mut u32;
        sp = sp.sub(1);
        *sp = entry as u32; // return address switch_to's `ret` will use
        sp = sp.sub(1);
        *sp = 0; // ebx
        sp = sp.sub(1);
        *sp = 0; // esi
        sp = sp.sub(1);
        *sp = 0; // edi
        sp = sp.sub(1);
        *sp = 0; // ebp
        sp as u32
    }
}

/// Load `cr3` with a page directory's physical address.
pub fn set_page_directory(phys_addr: u32) {
    unsafe {
        asm!("mov cr3, {0}", in(reg) phys_addr, options(nostack, preserves_flags));
    }
}
