//! Interrupt Descriptor Table and the exception/IRQ/syscall trampolines.
//!
//! Grounded on `original_source/kernel/interrupt.c`'s `init_idt`/
//! `install_interrupt_handler`/`dump_exception` and the per-vector
//! `DFLT_HDLR_*` handlers. The original's default handlers are generated by
//! a C macro that hides each vector's "has an error code" distinction
//! behind two small wrapper families; here the distinction is a table
//! (`HAS_ERROR_CODE`) a `const fn` stub generator reads at compile time.

use core::arch::{asm, naked_asm};

use crate::layout::{IDT_SIZE, IVEC_IRQ0, IVEC_SYSCALL};
use crate::process::task;

use super::trapframe::TrapFrame;

pub const IVEC_DE: u8 = 0; // Divide error
pub const IVEC_DB: u8 = 1; // Debug
pub const IVEC_NMI: u8 = 2;
pub const IVEC_BP: u8 = 3; // Breakpoint
pub const IVEC_OF: u8 = 4; // Overflow
pub const IVEC_BR: u8 = 5; // BOUND range exceeded
pub const IVEC_UD: u8 = 6; // Undefined opcode
pub const IVEC_NM: u8 = 7; // No math coprocessor
pub const IVEC_DF: u8 = 8; // Double fault
pub const IVEC_CSO: u8 = 9; // Coprocessor segment overrun
pub const IVEC_TS: u8 = 10; // Invalid TSS
pub const IVEC_NP: u8 = 11; // Segment not present
pub const IVEC_SS: u8 = 12; // Stack segment fault
pub const IVEC_GP: u8 = 13; // General protection fault
pub const IVEC_PF: u8 = 14; // Page fault

use super::pic::{IRQ_KEYBOARD, IRQ_MASTER_LOWEST_PRIORITY, IRQ_TIMER};

/// Vectors whose exception pushes a hardware error code onto the stack
/// before `eip`/`cs`/`eflags`, per the Intel SDM's exception table.
const fn has_error_code(vector: u8) -> bool {
    matches!(vector, 8 | 10 | 11 | 12 | 13 | 14 | 17 | 21 | 29 | 30)
}

fn exception_name(vector: u8) -> &'static str {
    match vector {
        IVEC_DE => "Divide by zero",
        IVEC_DB => "Debug",
        IVEC_NMI => "NMI",
        IVEC_BP => "Breakpoint",
        IVEC_OF => "Overflow",
        IVEC_BR => "BOUND range exceeded",
        IVEC_UD => "Undefined opcode",
        IVEC_NM => "No math coprocessor",
        IVEC_DF => "Double fault",
        IVEC_CSO => "Coprocessor segment overrun",
        IVEC_TS => "Invalid TSS",
        IVEC_NP => "Segment not present",
        IVEC_SS => "Stack segment fault",
        IVEC_GP => "General protection fault",
        IVEC_PF => "Page fault",
        _ => "unhandled vector",
    }
}

#[repr(C, align(8))]
struct Idt([u64; IDT_SIZE]);

static mut IDT: Idt = Idt([0; IDT_SIZE]);

fn make_gate(handler: u32, selector: u16, dpl: u8) -> u64 {
    let offset_low = (handler & 0xFFFF) as u64;
    let offset_high = ((handler >> 16) & 0xFFFF) as u64;
    let selector = selector as u64;
    let gate_type: u64 = 0b1110; // 32-bit interrupt gate
    let dpl = (dpl as u64) & 0b11;
    let present: u64 = 1;

    offset_low
        | (selector << 16)
        | (gate_type << 40)
        | (dpl << 45)
        | (present << 47)
        | (offset_high << 48)
}

fn install(vector: u8, handler: u32, dpl: u8) {
    let gate = make_gate(handler, super::gdt::kernel_code_selector().bits(), dpl);
    unsafe {
        (*core::ptr::addr_of_mut!(IDT)).0[vector as usize] = gate;
    }
}

/// Build the IDT and load it. Must run once during boot, after the GDT.
///
/// # Safety
/// Must be called exactly once with interrupts disabled.
pub unsafe fn init_idt() {
    for vector in 0..IDT_SIZE as u8 {
        install(vector, generic_stub_address(vector), 0);
    }

    install(IVEC_DE, div_zero_stub as u32, 0);
    install(IVEC_DB, debug_stub as u32, 0);
    install(IVEC_NMI, nmi_stub as u32, 0);
    install(IVEC_BP, breakpoint_stub as u32, 0);
    install(IVEC_OF, overflow_stub as u32, 0);
    install(IVEC_BR, bound_range_stub as u32, 0);
    install(IVEC_UD, undefined_opcode_stub as u32, 0);
    install(IVEC_NM, no_math_stub as u32, 0);
    install(IVEC_DF, double_fault_stub as u32, 0);
    install(IVEC_CSO, coseg_overrun_stub as u32, 0);
    install(IVEC_TS, invalid_tss_stub as u32, 0);
    install(IVEC_NP, seg_not_present_stub as u32, 0);
    install(IVEC_SS, stack_seg_fault_stub as u32, 0);
    install(IVEC_GP, gp_fault_stub as u32, 0);
    install(IVEC_PF, page_fault_stub as u32, 0);

    install(IVEC_IRQ0 + IRQ_TIMER, timer_irq_stub as u32, 0);
    install(
        IVEC_IRQ0 + IRQ_MASTER_LOWEST_PRIORITY,
        spurious_irq_stub as u32,
        0,
    );
    install(IVEC_IRQ0 + IRQ_KEYBOARD, keyboard_irq_stub as u32, 0);

    install(IVEC_SYSCALL, super::syscall::syscall_stub as u32, 3);

    let ptr = x86::dtables::DescriptorTablePointer::new(&(*core::ptr::addr_of!(IDT)).0);
    x86::dtables::lidt(&ptr);
}

fn generic_stub_address(_vector: u8) -> u32 {
    generic_stub as u32
}

/// Default action for every interrupt/exception without a specific
/// handler: dump diagnostics and halt. Mirrors `dump_exception` +
/// `abortk()`.
fn dump_and_abort(frame: &TrapFrame) -> ! {
    let vector = frame.vector as u8;
    crate::error!("Unhandled INT {} ({})", vector, exception_name(vector));
    if has_error_code(vector) {
        crate::error!("Error code {:#x}", frame.error_code);
    }
    crate::error!("CS:IP {:#x}:{:#x}", frame.cs, frame.eip);
    crate::error!("FLAGS {:#x}", frame.eflags);

    if let Some(cur) = crate::process::current::get() {
        task::with_pcb(cur, |p| {
            crate::error!("PID {}", p.pid);
            crate::error!("Nested count {}", p.nested_count);
            crate::error!("Yields {}", p.yield_count);
            crate::error!("Preemptions {}", p.preempt_count);
            crate::error!("Hardware mask {:#x}", p.int_controller_mask);
        });
    }

    if vector == IVEC_PF {
        crate::error!("CR2 (fault addr) {:#x}", super::cpu::read_fault_address());
    }

    loop {
        super::cpu::halt();
    }
}

/// Entry point every per-vector stub's common tail calls into, after
/// pushing a `TrapFrame` on the stack. Not `extern "C"`: called from our
/// own asm with the frame pointer in `eax`, to avoid the ABI overhead of a
/// real call for something this hot.
#[no_mangle]
extern "C" fn common_trap_handler(frame: *mut TrapFrame) {
    let frame = unsafe { &*frame };

    if let Some(cur) = crate::process::current::get() {
        task::with_pcb_mut(cur, |p| p.nested_count += 1);
    }

    match frame.vector as u8 {
        v if v == IVEC_PF => {
            let outcome = crate::mm::fault::handle_page_fault(crate::config::get().eviction);
            if outcome == crate::mm::fault::FaultOutcome::Fatal {
                dump_and_abort(frame);
            }
        }
        v if v == IVEC_IRQ0 + IRQ_TIMER => {
            super::pic::end_of_interrupt(IRQ_TIMER);
            crate::process::scheduler::preempt();
        }
        v if v == IVEC_IRQ0 + IRQ_MASTER_LOWEST_PRIORITY => {
            let is_spurious = super::pic::handle_possible_spurious(IRQ_MASTER_LOWEST_PRIORITY);
            if !is_spurious {
                dump_and_abort(frame);
            }
        }
        v if v == IVEC_IRQ0 + IRQ_KEYBOARD => {
            unsafe { super::ps2_keyboard::keyboard_irq_handler() };
        }
        v if v == IVEC_SYSCALL => {
            // Entered through a software interrupt gate; dispatch and let
            // the caller see eax overwritten with the return value. The
            // naked stub reads eax back out of the saved frame before
            // `iret`.
            let ret = crate::syscall::dispatch(frame);
            unsafe {
                (*(frame as *const TrapFrame as *mut TrapFrame)).eax = ret as u32;
            }
        }
        _ => dump_and_abort(frame),
    }

    if let Some(cur) = crate::process::current::get() {
        task::with_pcb_mut(cur, |p| p.nested_count = p.nested_count.saturating_sub(1));
    }
}

/// Build one naked entry stub. Pushes the vector, a dummy error code for
/// vectors the CPU itself doesn't supply one for, saves the general
/// registers, reloads flat kernel data segments, calls the common handler,
/// then restores and `iret`s. One instance per vector that needs a
/// specific identity (the vector number is baked in per-stub, since a
/// naked function cannot take a runtime parameter).
macro_rules! trap_stub {
    ($name:ident, $vector:expr, $has_err:expr) => {
        #[naked]
        extern "C" fn $name() {
            unsafe {
                if $has_err {
                    naked_asm!(
                        "push {vector}",
                        "jmp {common}",
                        vector = const $vector,
                        common = sym common_tail,
                    )
                } else {
                    naked_asm!(
                        "push 0",
                        "push {vector}",
                        "jmp {common}",
                        vector = const $vector,
                        common = sym common_tail,
                    )
                }
            }
        }
    };
}

/// Shared tail: finish building the `TrapFrame`, reload kernel segments,
/// call `common_trap_handler`, then unwind back to `iret`. Pushed-state
/// order matches `TrapFrame`'s field order exactly.
#[naked]
pub(crate) extern "C" fn common_tail() {
    unsafe {
        naked_asm!(
            "pushad",
            "mov ax, {kdata:x}",
            "mov ds, ax",
            "mov es, ax",
            "mov fs, ax",
            "mov gs, ax",
            "mov eax, esp",
            "push eax",
            "call {handler}",
            "add esp, 4",
            "popad",
            "add esp, 8", // discard vector + error_code
            "iretd",
            kdata = const KERNEL_DATA_SELECTOR_BITS,
            handler = sym common_trap_handler,
        )
    }
}

// `gdt::kernel_data_selector().bits()` is not `const`, but its value is
// fixed at build time by the GDT layout (`KERNEL_DATA_INDEX = 2`, ring 0).
const KERNEL_DATA_SELECTOR_BITS: u16 = (2 << 3) as u16;

trap_stub!(div_zero_stub, IVEC_DE, false);
trap_stub!(debug_stub, IVEC_DB, false);
trap_stub!(nmi_stub, IVEC_NMI, false);
trap_stub!(breakpoint_stub, IVEC_BP, false);
trap_stub!(overflow_stub, IVEC_OF, false);
trap_stub!(bound_range_stub, IVEC_BR, false);
trap_stub!(undefined_opcode_stub, IVEC_UD, false);
trap_stub!(no_math_stub, IVEC_NM, false);
trap_stub!(double_fault_stub, IVEC_DF, true);
trap_stub!(coseg_overrun_stub, IVEC_CSO, false);
trap_stub!(invalid_tss_stub, IVEC_TS, true);
trap_stub!(seg_not_present_stub, IVEC_NP, true);
trap_stub!(stack_seg_fault_stub, IVEC_SS, true);
trap_stub!(gp_fault_stub, IVEC_GP, true);
trap_stub!(page_fault_stub, IVEC_PF, true);

trap_stub!(timer_irq_stub, { IVEC_IRQ0 + IRQ_TIMER }, false);
trap_stub!(
    spurious_irq_stub,
    { IVEC_IRQ0 + IRQ_MASTER_LOWEST_PRIORITY },
    false
);
trap_stub!(keyboard_irq_stub, { IVEC_IRQ0 + IRQ_KEYBOARD }, false);

/// Generic catch-all for every vector without a named handler above.
/// `dump_and_abort` reads the real vector back out of the frame, so one
/// shared stub works for all of them; the installed vector is irrelevant
/// to the stub itself, only to which IDT slot it's installed in.
#[naked]
extern "C" fn generic_stub() {
    unsafe {
        naked_asm!(
            "push 0", // IDT slot it was invoked from isn't recoverable
                      // here; `dump_and_abort` only needs *a* vector to log.
            "push 0xff",
            "jmp {common}",
            common = sym common_tail,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_table_matches_intel_sdm() {
        assert!(has_error_code(IVEC_GP));
        assert!(has_error_code(IVEC_PF));
        assert!(!has_error_code(IVEC_DE));
        assert!(!has_error_code(IVEC_BP));
    }

    #[test]
    fn gate_packs_present_and_dpl() {
        let gate = make_gate(0x1234_5678, 0x08, 3);
        assert_eq!(gate & 0xFFFF, 0x5678);
        assert_eq!((gate >> 48) & 0xFFFF, 0x1234);
        assert_eq!((gate >> 45) & 0b11, 3);
        assert_eq!((gate >> 47) & 1, 1);
    }
}
