//! Driver for the Intel 8253/8254 Programmable Interval Timer.
//!
//! Grounded on `pit_8235.h`: same base frequency, same command-byte
//! encoding, same LSB-then-MSB divisor write. Counter 0 is wired to IRQ0
//! and drives the preemption tick; we configure it for mode 3 (square
//! wave generator), matching the original's choice.

use x86::io::{inb, outb};

/// Oscillator frequency driving the PIT, in Hz. Confirmed against
/// `PIT_BASE_HZ` in `pit_8235.h` — not the often-quoted 1,193,182.
pub const PIT_BASE_HZ: u32 = 1_193_180;

const PIT_CHANNEL0_DATA: u16 = 0x40;
const PIT_COMMAND: u16 = 0x43;

const PIT_MODE_SQUARE_WAVE: u8 = 3;
const PIT_MODE_INTERRUPT_ON_TERMINAL_COUNT: u8 = 0;
const PIT_RW_LSB_MSB: u8 = 3;
const PIT_LATCH_COUNT: u8 = 0;

/// Largest divisor the 16-bit counter can hold, in milliseconds at
/// `PIT_BASE_HZ`. `busy_wait_ms` cannot wait longer than this in one call.
pub const MAX_BUSY_WAIT_MS: u32 = 0xFFFF / (PIT_BASE_HZ / 1000);

/// Target preemption frequency.
pub const TICK_HZ: u32 = 100;

fn pit_cmd_byte(counter: u8, rw: u8, mode: u8, bcd: u8) -> u8 {
    (counter << 6) | (rw << 4) | (mode << 1) | bcd
}

/// Program channel 0 to fire at (approximately) `hz`, returning the actual
/// achieved frequency so the caller can log the rounding error.
pub fn set_irq_freq(hz: u32) -> u32 {
    let divisor = (PIT_BASE_HZ / hz).clamp(1, 0xFFFF);
    unsafe {
        outb(
            PIT_COMMAND,
            pit_cmd_byte(0, PIT_RW_LSB_MSB, PIT_MODE_SQUARE_WAVE, 0),
        );
        outb(PIT_CHANNEL0_DATA, (divisor & 0xFF) as u8);
        outb(PIT_CHANNEL0_DATA, ((divisor >> 8) & 0xFF) as u8);
    }
    PIT_BASE_HZ / divisor
}

/// Program the timer for the kernel's standard preemption tick.
pub fn init() -> u32 {
    set_irq_freq(TICK_HZ)
}

/// Busy-wait roughly `ms` milliseconds (at most `MAX_BUSY_WAIT_MS`) using a
/// one-shot channel 0 countdown, independent of anything the TSC measures.
/// Used to calibrate the TSC itself, so it cannot use the TSC to time
/// itself. Leaves channel 0 in one-shot mode; callers that need the
/// periodic preemption tick afterward must call `init()` again.
pub fn busy_wait_ms(ms: u32) {
    let ms = ms.min(MAX_BUSY_WAIT_MS).max(1);
    let divisor = ((PIT_BASE_HZ / 1000) * ms).clamp(1, 0xFFFF);
    unsafe {
        outb(
            PIT_COMMAND,
            pit_cmd_byte(0, PIT_RW_LSB_MSB, PIT_MODE_INTERRUPT_ON_TERMINAL_COUNT, 0),
        );
        outb(PIT_CHANNEL0_DATA, (divisor & 0xFF) as u8);
        outb(PIT_CHANNEL0_DATA, ((divisor >> 8) & 0xFF) as u8);
    }
    while latched_count() != 0 {
        core::hint::spin_loop();
    }
}

fn latched_count() -> u16 {
    unsafe {
        outb(PIT_COMMAND, PIT_LATCH_COUNT);
        let lo = inb(PIT_CHANNEL0_DATA) as u16;
        let hi = inb(PIT_CHANNEL0_DATA) as u16;
        (hi << 8) | lo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divisor_for_100hz_is_exact_enough() {
        let divisor = PIT_BASE_HZ / TICK_HZ;
        let achieved = PIT_BASE_HZ / divisor;
        assert!(achieved.abs_diff(TICK_HZ) <= 1);
    }

    #[test]
    fn command_byte_matches_mode3_square_wave() {
        assert_eq!(pit_cmd_byte(0, PIT_RW_LSB_MSB, PIT_MODE_SQUARE_WAVE, 0), 0b0011_0110);
    }

    #[test]
    fn one_shot_command_byte_is_mode0() {
        assert_eq!(
            pit_cmd_byte(0, PIT_RW_LSB_MSB, PIT_MODE_INTERRUPT_ON_TERMINAL_COUNT, 0),
            0b0011_0000
        );
    }

    #[test]
    fn max_busy_wait_covers_the_calibration_sample_window() {
        assert!(MAX_BUSY_WAIT_MS >= 10);
    }
}
