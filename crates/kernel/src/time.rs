//! Time and timestamp utilities.
//!
//! Thin wrapper over `arch::x86::tsc` so the logging/panic code doesn't need
//! to know about the time-stamp counter directly. All timestamps here are
//! relative to boot, in microseconds.

use crate::arch::x86::tsc;
use core::sync::atomic::{AtomicU64, Ordering};

static BOOT_TSC: AtomicU64 = AtomicU64::new(0);

/// Record the TSC value at boot as the zero point for `get_timestamp_us`.
/// Must run after `tsc::calibrate` so `cpu_mhz()` is already known.
pub fn init_boot_timestamp() {
    BOOT_TSC.store(tsc::read_tsc(), Ordering::Relaxed);
}

/// Current time since boot in microseconds.
pub fn get_timestamp_us() -> u64 {
    let mhz = tsc::cpu_mhz().max(1) as u64;
    let delta = tsc::read_tsc().saturating_sub(BOOT_TSC.load(Ordering::Relaxed));
    delta / mhz
}

/// Time since boot in milliseconds.
pub fn get_time_since_boot_ms() -> u64 {
    get_timestamp_us() / 1000
}

/// Uptime in milliseconds (alias for `get_time_since_boot_ms`).
pub fn get_uptime_ms() -> u64 {
    get_time_since_boot_ms()
}
