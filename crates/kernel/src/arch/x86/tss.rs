//! 32-bit Task State Segment.
//!
//! We don't use hardware task-switching (the classic i386 TSS-per-task
//! design), only software context switches. The TSS exists purely to give
//! the CPU a known ring-0 stack (`esp0`/`ss0`) to switch to on a
//! privilege-level change (interrupt/exception/syscall from ring 3). One
//! TSS total: this kernel targets a single core.

use core::mem::size_of;

#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct TaskStateSegment {
    pub link: u16,
    _reserved0: u16,
    pub esp0: u32,
    pub ss0: u16,
    _reserved1: u16,
    pub esp1: u32,
    pub ss1: u16,
    _reserved2: u16,
    pub esp2: u32,
    pub ss2: u16,
    _reserved3: u16,
    pub cr3: u32,
    pub eip: u32,
    pub eflags: u32,
    pub eax: u32,
    pub ecx: u32,
    pub edx: u32,
    pub ebx: u32,
    pub esp: u32,
    pub ebp: u32,
    pub esi: u32,
    pub edi: u32,
    pub es: u16,
    _reserved4: u16,
    pub cs: u16,
    _reserved5: u16,
    pub ss: u16,
    _reserved6: u16,
    pub ds: u16,
    _reserved7: u16,
    pub fs: u16,
    _reserved8: u16,
    pub gs: u16,
    _reserved9: u16,
    pub ldt_selector: u16,
    _reserved10: u16,
    _trap: u16,
    pub iomap_base: u16,
}

const _: () = assert!(size_of::<TaskStateSegment>() == 104);

impl TaskStateSegment {
    pub const fn new() -> Self {
        Self {
            link: 0,
            _reserved0: 0,
            esp0: 0,
            ss0: 0,
            _reserved1: 0,
            esp1: 0,
            ss1: 0,
            _reserved2: 0,
            esp2: 0,
            ss2: 0,
            _reserved3: 0,
            cr3: 0,
            eip: 0,
            eflags: 0,
            eax: 0,
            ecx: 0,
            edx: 0,
            ebx: 0,
            esp: 0,
            ebp: 0,
            esi: 0,
            edi: 0,
            es: 0,
            _reserved4: 0,
            cs: 0,
            _reserved5: 0,
            ss: 0,
            _reserved6: 0,
            ds: 0,
            _reserved7: 0,
            fs: 0,
            _reserved8: 0,
            gs: 0,
            _reserved9: 0,
            ldt_selector: 0,
            _reserved10: 0,
            _trap: 0,
            iomap_base: size_of::<TaskStateSegment>() as u16,
        }
    }

    /// Point the TSS at the given task's kernel stack. Called by the
    /// scheduler on every dispatch, mirroring `setup_current_running`'s
    /// `cpu_set_interrupt_stack` call in the original kernel.
    pub fn set_kernel_stack(&mut self, esp0: u32) {
        self.esp0 = esp0;
        self.ss0 = super::gdt::kernel_data_selector().bits() as u16;
    }
}

static mut TSS: TaskStateSegment = TaskStateSegment::new();

/// # Safety
/// Must be called once during boot, before `init_gdt`.
pub unsafe fn init_tss() -> &'static mut TaskStateSegment {
    &mut *core::ptr::addr_of_mut!(TSS)
}

/// Point the live TSS at a process's kernel stack. Called by the scheduler
/// on every dispatch of a `Kind::Process` task (see `process::scheduler`).
/// Single core, always called from a `nointerrupt` region, so the raw
/// static access is sound.
pub fn set_kernel_stack(esp0: u32) {
    unsafe {
        (*core::ptr::addr_of_mut!(TSS)).set_kernel_stack(esp0);
    }
}
