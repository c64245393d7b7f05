//! Boot sequence: brings the CPU up from "bootblock just jumped to `_start`"
//! to "scheduler is running the init task".
//!
//! Milestone order: GDT -> TSS -> IDT -> PIC -> PIT -> interrupts-enable,
//! then the memory manager, process table, and mailbox table come up,
//! followed by TSC calibration and the handoff into the first task.

use crate::arch::x86::{context, cpu, gdt, idt, pic, pit, ps2_keyboard, serial, tsc, tss};
use crate::sync::critical::nointerrupt_enter;
use crate::{bootimage, config, heap, layout, mm, process, prng, sync, time};

/// Early architecture + subsystem initialization. Runs with interrupts
/// disabled throughout, then hands off to the first task and never returns:
/// the boot stack is abandoned the moment `context::switch_to` switches
/// away from it.
///
/// # Safety
/// Must be called exactly once, immediately after `_start` gets control,
/// before any other kernel code runs.
pub unsafe fn early_init() -> ! {
    cpu::disable_interrupts();

    // GDT/TSS/IDT: segmentation and privilege transitions must exist before
    // anything can fault safely.
    let tss = tss::init_tss();
    gdt::init_gdt(tss);
    idt::init_idt();

    serial::init_serial().expect("16550 COM1 is always present under QEMU/Bochs");

    serial::serial_write(b"\n");
    serial::serial_write(b"================================================================================\n");
    serial::serial_write(b"                      pm_kernel - x86 protected-mode kernel\n");
    serial::serial_write(b"================================================================================\n");
    serial::serial_write(b"[BOOT] GDT loaded\n");
    serial::serial_write(b"[BOOT] TSS loaded\n");
    serial::serial_write(b"[BOOT] IDT loaded\n");

    // PIC: remap before anything unmasks an IRQ line, so spurious vectors
    // during the rest of boot land on our own vectors rather than the
    // BIOS's default 8/0xf0.
    pic::init(layout::IVEC_IRQ0);
    ps2_keyboard::init();
    serial::serial_write(b"[BOOT] PIC remapped, PS/2 keyboard ready\n");

    heap::init_heap();
    serial::serial_write(b"[BOOT] Heap online\n");

    mm::init();
    process::task::init_pcb_table();
    sync::mbox::init();
    serial::serial_write(b"[BOOT] Memory manager, task table, mailboxes initialized\n");

    // TSC calibration needs a busy-wait that doesn't depend on the
    // scheduler (nothing to yield to yet); `pit::busy_wait_ms` drives the
    // PIT in one-shot mode for this, then `pit::init` re-arms the periodic
    // preemption tick calibration left it in one-shot mode.
    tsc::calibrate(pit::busy_wait_ms);
    let achieved_hz = pit::init();
    time::init_boot_timestamp();
    prng::init_prng(tsc::read_tsc());
    serial::serial_write(b"[BOOT] TSC calibrated, PIT re-armed for preemption\n");

    crate::build_info::print_build_info();

    let cpu_info = cpu::identify();
    let vendor = core::str::from_utf8(&cpu_info.vendor).unwrap_or("unknown");
    crate::info!(
        "cpu: {} family={} model={} ~{} MHz, pit: {} Hz",
        vendor, cpu_info.family, cpu_info.model, cpu_info.mhz, achieved_hz
    );

    pic::enable_irq(pic::IRQ_TIMER);
    pic::enable_irq(pic::IRQ_KEYBOARD);
    serial::serial_write(b"[BOOT] Timer and keyboard IRQs unmasked\n");

    let init_idx = process::create_thread(init_task_entry, 0)
        .expect("boot must be able to create the init task");
    crate::info!("init task created, entering scheduler");

    // Hand off to the init task directly: there is no "previous" task to
    // save (the boot stack is abandoned), so this calls the same primitive
    // `scheduler_entry` uses for its second half instead of going through
    // `scheduler_entry` itself (which requires a current task to save).
    // `nointerrupt_enter` here is paired with the `nointerrupt_leave` every
    // freshly prepared stack's trampoline runs on its first dispatch.
    nointerrupt_enter();
    let mut discarded_boot_esp: u32 = 0;
    let init_esp = process::task::with_pcb(init_idx, |p| p.kernel_stack);
    context::switch_to(&mut discarded_boot_esp, init_esp);

    unreachable!("control never returns to the abandoned boot stack");
}

/// The first task the scheduler ever runs. Walks the on-disk process
/// directory (empty unless the image was built `--vm` with process
/// arguments) and loads each entry as a user process, then falls back to an
/// idle loop that halts between interrupts and drains the keyboard buffer.
extern "C" fn init_task_entry() -> ! {
    crate::info!("init task running, pid={}", process::scheduler::getpid());

    let directory = bootimage::read_process_directory();
    if directory.is_empty() {
        crate::debug!("process directory empty; nothing to load");
    }

    let cfg = config::get();
    for entry in directory.iter() {
        if cfg.schedule_process_launching {
            let admitted = mm::admission::admit(
                cfg.avg_pages_per_process,
                cfg.new_process_wait_ms,
                50,
                process::sleep::msleep,
            );
            if admitted.is_err() {
                crate::warn!(
                    "too much competition for frames; skipping process at sector {}",
                    entry.start_sector
                );
                continue;
            }
        }

        let base = bootimage::sector_paddr(entry.start_sector) as u32;
        let limit = entry.sector_count * layout::SECTOR_SIZE as u32;
        match process::create_process(base, limit, 0) {
            Ok(idx) => {
                let pid = process::task::with_pcb(idx, |p| p.pid);
                crate::info!(
                    "loaded process pid={} from sector {} ({} sectors)",
                    pid, entry.start_sector, entry.sector_count
                );
            }
            Err(e) => crate::warn!(
                "failed to load process at sector {}: {:?}", entry.start_sector, e
            ),
        }
    }

    idle_loop()
}

/// Park the init task once there is nothing left to load: halt until the
/// next interrupt (timer or keyboard), drain any buffered keystroke, repeat.
/// Runs forever; on a system with no loaded processes this is the only
/// READY task and keeps the ready ring non-empty.
fn idle_loop() -> ! {
    loop {
        if let Some(ch) = ps2_keyboard::read_char() {
            crate::debug!("keystroke: {:?}", ch);
        }
        cpu::halt();
    }
}
