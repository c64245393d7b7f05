//! Global Descriptor Table.
//!
//! A minimal 32-bit protected-mode GDT: null, kernel code/data at ring 0,
//! user code/data at ring 3, and one TSS descriptor used to switch to the
//! kernel stack on a ring-3 -> ring-0 transition (interrupt, exception or
//! `int 0x30` syscall).

use core::mem::size_of;
use x86::dtables::{lgdt, DescriptorTablePointer};
use x86::segmentation::{
    BuildDescriptor, CodeSegmentType, DataSegmentType, Descriptor as SegDescriptor,
    SegmentDescriptorBuilder, SegmentSelector,
};
use x86::Ring;

use super::tss::TaskStateSegment;

const NULL_INDEX: usize = 0;
const KERNEL_CODE_INDEX: usize = 1;
const KERNEL_DATA_INDEX: usize = 2;
const USER_CODE_INDEX: usize = 3;
const USER_DATA_INDEX: usize = 4;
const TSS_INDEX: usize = 5;
const GDT_ENTRIES: usize = 6;

static mut GDT: [u64; GDT_ENTRIES] = [0; GDT_ENTRIES];

pub fn kernel_code_selector() -> SegmentSelector {
    SegmentSelector::new(KERNEL_CODE_INDEX as u16, Ring::Ring0)
}
pub fn kernel_data_selector() -> SegmentSelector {
    SegmentSelector::new(KERNEL_DATA_INDEX as u16, Ring::Ring0)
}
pub fn user_code_selector() -> SegmentSelector {
    SegmentSelector::new(USER_CODE_INDEX as u16, Ring::Ring3)
}
pub fn user_data_selector() -> SegmentSelector {
    SegmentSelector::new(USER_DATA_INDEX as u16, Ring::Ring3)
}
pub fn tss_selector() -> SegmentSelector {
    SegmentSelector::new(TSS_INDEX as u16, Ring::Ring0)
}

/// Build and load the GDT, reload segment registers, and load the task
/// register. Must run once during early boot, before the IDT and before any
/// interrupt can fire.
///
/// # Safety
/// Must be called exactly once, with interrupts disabled, before any code
/// touches segment registers or the task register.
pub unsafe fn init_gdt(tss: &'static TaskStateSegment) {
    let kcode = SegDescriptor::builder()
        .limit(0xFFFFF)
        .base(0)
        .code_segment(CodeSegmentType::ExecuteRead)
        .present()
        .dpl(Ring::Ring0)
        .limit_granularity_4kb()
        .db()
        .finish();
    let kdata = SegDescriptor::builder()
        .limit(0xFFFFF)
        .base(0)
        .data_segment(DataSegmentType::ReadWrite)
        .present()
        .dpl(Ring::Ring0)
        .limit_granularity_4kb()
        .db()
        .finish();
    let ucode = SegDescriptor::builder()
        .limit(0xFFFFF)
        .base(0)
        .code_segment(CodeSegmentType::ExecuteRead)
        .present()
        .dpl(Ring::Ring3)
        .limit_granularity_4kb()
        .db()
        .finish();
    let udata = SegDescriptor::builder()
        .limit(0xFFFFF)
        .base(0)
        .data_segment(DataSegmentType::ReadWrite)
        .present()
        .dpl(Ring::Ring3)
        .limit_granularity_4kb()
        .db()
        .finish();

    let tss_base = tss as *const _ as u32;
    let tss_limit = (size_of::<TaskStateSegment>() - 1) as u32;
    let tss_desc = SegDescriptor::builder()
        .base(tss_base)
        .limit(tss_limit)
        .tss()
        .present()
        .dpl(Ring::Ring0)
        .finish();

    GDT[NULL_INDEX] = 0;
    GDT[KERNEL_CODE_INDEX] = kcode.as_u64();
    GDT[KERNEL_DATA_INDEX] = kdata.as_u64();
    GDT[USER_CODE_INDEX] = ucode.as_u64();
    GDT[USER_DATA_INDEX] = udata.as_u64();
    GDT[TSS_INDEX] = tss_desc.as_u64();

    let ptr = DescriptorTablePointer::new(&GDT);
    lgdt(&ptr);

    reload_segments();
    load_task_register();
}

/// Reload CS via a far jump and the data segment registers, following the
/// standard protected-mode GDT-reload sequence (OSDev wiki "GDT Tutorial").
unsafe fn reload_segments() {
    use core::arch::asm;
    let kdata = kernel_data_selector().bits();
    asm!(
        "mov {0:x}, ds",
        "mov ds, {1:x}",
        "mov es, {1:x}",
        "mov fs, {1:x}",
        "mov gs, {1:x}",
        "mov ss, {1:x}",
        "push {2:e}",
        "lea {2:e}, [2f]",
        "push {2:e}",
        "retf",
        "2:",
        out(reg) _,
        in(reg) kdata as u16,
        inout(reg) kernel_code_selector().bits() as u32 => _,
        options(nostack, preserves_flags)
    );
}

unsafe fn load_task_register() {
    x86::task::load_tr(tss_selector());
}
