//! 32-bit protected-mode x86 platform code: GDT/TSS/IDT, the 8259 PIC, the
//! 8253/8254 PIT, TSC-based timing, 16550 serial, 8042 PS/2 keyboard, the
//! context switch primitive, the boot sequence, and the syscall gate.

pub mod boot;
pub mod context;
pub mod cpu;
pub mod gdt;
pub mod idt;
pub mod pic;
pub mod pit;
pub mod ps2_keyboard;
pub mod serial;
pub mod syscall;
pub mod trapframe;
pub mod tsc;
pub mod tss;
