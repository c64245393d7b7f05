//! Time-stamp counter access and calibration.
//!
//! No HPET/APIC-timer fallback chain here: on this target there is exactly
//! one clock source below the PIT tick counter itself, the `rdtsc`
//! instruction, read with the 32-bit two-register form (no
//! `core::arch::x86_64::_rdtsc` intrinsic exists for a 32-bit target).

use core::arch::asm;
use core::sync::atomic::{AtomicU32, Ordering};

static CPU_MHZ: AtomicU32 = AtomicU32::new(0);

/// Read the 64-bit time-stamp counter.
pub fn read_tsc() -> u64 {
    let lo: u32;
    let hi: u32;
    unsafe {
        asm!("rdtsc", out("eax") lo, out("edx") hi, options(nomem, nostack));
    }
    ((hi as u64) << 32) | lo as u64
}

/// Ticks of the system clock since boot, as seen by the scheduler's
/// `wakeup_time` comparisons. Currently backed directly by the TSC.
pub fn read_cpu_ticks() -> u64 {
    read_tsc()
}

/// Estimate the CPU's clock speed in MHz by counting TSC ticks across a
/// fixed number of PIT-driven milliseconds, storing the result for
/// `cpu_mhz()`/the `cpuspeed` syscall.
pub fn calibrate(busy_wait_ms: impl Fn(u32)) {
    const SAMPLE_MS: u32 = 10;
    let start = read_tsc();
    busy_wait_ms(SAMPLE_MS);
    let end = read_tsc();
    let delta = end.saturating_sub(start);
    let mhz = (delta / (SAMPLE_MS as u64) / 1000).max(1) as u32;
    CPU_MHZ.store(mhz, Ordering::Relaxed);
}

pub fn cpu_mhz() -> u32 {
    CPU_MHZ.load(Ordering::Relaxed)
}

/// Busy-sleep for `ms` milliseconds using the calibrated TSC rate.
pub fn msleep(ms: u32) {
    let mhz = cpu_mhz().max(1) as u64;
    let ticks = mhz * 1000 * ms as u64;
    let start = read_tsc();
    while read_tsc().saturating_sub(start) < ticks {
        core::hint::spin_loop();
    }
}
