//! Panic handler.
//!
//! Dumps the panic location/message, the current task's identity and
//! nested-interrupt depth (mirroring the vector dump the default exception
//! handler in `arch::x86::idt` prints), heap stats, and build info, then
//! halts. There is no unwinding in this kernel: a
//! kernel-side panic is always fatal to the whole system.

use core::panic::PanicInfo;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::arch::x86::serial::serial_write;

static PANICKING: AtomicBool = AtomicBool::new(false);
static PANIC_COUNT: AtomicU64 = AtomicU64::new(0);

pub fn panic_handler(info: &PanicInfo) -> ! {
    if PANICKING.swap(true, Ordering::SeqCst) {
        serial_write(b"\n!!! RECURSIVE PANIC !!!\n");
        halt();
    }
    let panic_num = PANIC_COUNT.fetch_add(1, Ordering::SeqCst) + 1;

    crate::arch::x86::cpu::disable_interrupts();

    print_header(panic_num);
    print_location_and_message(info);
    print_task_context();
    print_heap_stats();
    print_build_info();

    halt();
}

fn print_header(panic_num: u64) {
    serial_write(b"\n");
    serial_write(b"================================================================================\n");
    serial_write(b"!!!                              KERNEL PANIC                                !!!\n");
    serial_write(b"================================================================================\n");
    if panic_num > 1 {
        let msg = alloc::format!("Panic #{}\n", panic_num);
        serial_write(msg.as_bytes());
    }
}

fn print_location_and_message(info: &PanicInfo) {
    if let Some(location) = info.location() {
        let loc = alloc::format!(
            "Location: {}:{}:{}\n",
            location.file(),
            location.line(),
            location.column()
        );
        serial_write(loc.as_bytes());
    } else {
        serial_write(b"Location: <unknown>\n");
    }

    let msg = alloc::format!("Message:  {}\n", info.message());
    serial_write(msg.as_bytes());
}

fn print_task_context() {
    let pid = crate::process::current::current_pid();
    let depth = crate::process::current::nested_depth();
    let msg = alloc::format!(
        "Current task: pid={} nested_interrupt_depth={}\n",
        pid, depth
    );
    serial_write(msg.as_bytes());
}

fn print_heap_stats() {
    let stats = crate::heap::get_heap_stats();
    let msg = alloc::format!(
        "Heap: {} bytes current, {} bytes peak, {} allocs, {} deallocs, {} failures\n",
        stats.current_allocated(),
        stats.peak_allocated(),
        stats.total_allocations(),
        stats.total_deallocations(),
        stats.allocation_failures(),
    );
    serial_write(msg.as_bytes());
}

fn print_build_info() {
    let version = crate::build_info::get_version_string();
    let msg = alloc::format!("Build: {}\n", version);
    serial_write(msg.as_bytes());
}

fn halt() -> ! {
    serial_write(b"================================================================================\n");
    serial_write(b"System halted.\n");
    serial_write(b"================================================================================\n");
    loop {
        crate::arch::x86::cpu::halt();
    }
}

pub fn get_panic_count() -> u64 {
    PANIC_COUNT.load(Ordering::Relaxed)
}

pub fn is_panicking() -> bool {
    PANICKING.load(Ordering::Relaxed)
}
