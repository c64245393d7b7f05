//! Driver for the Intel 8259 Programmable Interrupt Controller (dual,
//! cascaded master/slave pair).
//!
//! Grounded directly on `intctl_8259.c`/`.h`: same ICW1-4 remap sequence,
//! same specific-EOI with slave-cascade handling, same spurious-IRQ
//! detection via an ISR read on each PIC's lowest-priority line (IRQ 7 on
//! the master, IRQ 15 on the slave). Built on `x86::io` port access, since
//! `x86_64::instructions::port::Port` does not exist for a 32-bit target.

use spin::Mutex;
use x86::io::{inb, outb};

const ICW1_ICW4: u8 = 0x01;
const ICW1_INIT: u8 = 0x10;
const ICW4_8086: u8 = 0x01;

const OCW2_EOI: u8 = 0x20;
const OCW3_READ_ISR: u8 = 0x0B;

pub const IRQ_TIMER: u8 = 0;
pub const IRQ_KEYBOARD: u8 = 1;
pub const IRQ_CASCADE: u8 = 2;
pub const IRQ_RTC: u8 = 8;
pub const IRQ_MAX: u8 = 15;

pub const IRQ_MASTER_LOWEST_PRIORITY: u8 = 7;
pub const IRQ_SLAVE_START: u8 = 8;
pub const IRQ_SLAVE_LOWEST_PRIORITY: u8 = 15;

struct Pic {
    command: u16,
    data: u16,
}

impl Pic {
    fn handles(&self, irq: u8) -> bool {
        self.offset() <= irq && irq < self.offset() + 8
    }
    fn offset(&self) -> u8 {
        if self.command == MASTER_CMD { 0 } else { 8 }
    }

    unsafe fn write_command(&self, value: u8) {
        outb(self.command, value);
        io_wait();
    }
    unsafe fn write_data(&self, value: u8) {
        outb(self.data, value);
        io_wait();
    }
    unsafe fn read_data(&self) -> u8 {
        inb(self.data)
    }
    unsafe fn read_isr(&self) -> u8 {
        outb(self.command, OCW3_READ_ISR);
        inb(self.command)
    }
}

const MASTER_CMD: u16 = 0x20;
const MASTER_DATA: u16 = 0x21;
const SLAVE_CMD: u16 = 0xA0;
const SLAVE_DATA: u16 = 0xA1;

struct ChainedPics {
    master: Pic,
    slave: Pic,
    offset: u8,
}

impl ChainedPics {
    const fn new() -> Self {
        Self {
            master: Pic { command: MASTER_CMD, data: MASTER_DATA },
            slave: Pic { command: SLAVE_CMD, data: SLAVE_DATA },
            offset: 32,
        }
    }

    /// Remap IRQ 0-15 to vectors `offset..offset+16`, mask everything, wire
    /// the slave to the master's IRQ2 cascade line.
    unsafe fn initialize(&mut self, offset: u8) {
        self.offset = offset;

        let saved_mask1 = self.master.read_data();
        let saved_mask2 = self.slave.read_data();

        self.master.write_command(ICW1_INIT | ICW1_ICW4);
        self.slave.write_command(ICW1_INIT | ICW1_ICW4);

        self.master.write_data(offset);
        self.slave.write_data(offset + 8);

        self.master.write_data(1 << IRQ_CASCADE);
        self.slave.write_data(IRQ_CASCADE);

        self.master.write_data(ICW4_8086);
        self.slave.write_data(ICW4_8086);

        self.master.write_data(saved_mask1);
        self.slave.write_data(saved_mask2);
    }

    unsafe fn set_mask(&mut self, mask: u16) {
        self.master.write_data((mask & 0xFF) as u8);
        self.slave.write_data(((mask >> 8) & 0xFF) as u8);
    }

    unsafe fn get_mask(&self) -> u16 {
        (self.master.read_data() as u16) | ((self.slave.read_data() as u16) << 8)
    }

    unsafe fn mask_irq(&mut self, irq: u8) {
        let mask = self.get_mask() | (1u16 << irq);
        self.set_mask(mask);
    }

    unsafe fn unmask_irq(&mut self, irq: u8) {
        let mask = self.get_mask() & !(1u16 << irq);
        self.set_mask(mask);
    }

    /// Send specific EOI for `irq`, issuing the matching cascade EOI to the
    /// master when `irq` came from the slave.
    unsafe fn notify_end_of_interrupt(&mut self, irq: u8) {
        if self.slave.handles(irq) {
            self.slave.write_command(OCW2_EOI | (irq - 8));
            self.master.write_command(OCW2_EOI | IRQ_CASCADE);
        } else {
            self.master.write_command(OCW2_EOI | irq);
        }
    }

    /// Check whether the interrupt that fired on one of the lowest-priority
    /// lines (IRQ7/IRQ15) was spurious: read the in-service register and see
    /// whether the corresponding bit is actually set.
    unsafe fn is_spurious(&mut self, irq: u8) -> bool {
        let pic = if self.slave.handles(irq) { &self.slave } else { &self.master };
        let local_irq = irq - pic.offset();
        let isr = pic.read_isr();
        (isr & (1 << local_irq)) == 0
    }
}

unsafe impl Send for ChainedPics {}

static PICS: Mutex<ChainedPics> = Mutex::new(ChainedPics::new());

/// Spurious-interrupt counters, exposed for diagnostics.
static SPURIOUS_MASTER: core::sync::atomic::AtomicU32 = core::sync::atomic::AtomicU32::new(0);
static SPURIOUS_SLAVE: core::sync::atomic::AtomicU32 = core::sync::atomic::AtomicU32::new(0);

pub unsafe fn io_wait() {
    outb(0x80, 0);
}

/// Remap the PICs so hardware IRQ 0-15 land on vectors `vector_offset..+16`,
/// then mask every line (callers unmask what they actually handle).
pub fn init(vector_offset: u8) {
    let mut pics = PICS.lock();
    unsafe {
        pics.initialize(vector_offset);
        pics.set_mask(0xFFFF);
    }
}

pub fn enable_irq(irq: u8) {
    unsafe { PICS.lock().unmask_irq(irq) };
}

pub fn disable_irq(irq: u8) {
    unsafe { PICS.lock().mask_irq(irq) };
}

pub fn get_mask() -> u16 {
    unsafe { PICS.lock().get_mask() }
}

pub fn set_mask(mask: u16) {
    unsafe { PICS.lock().set_mask(mask) };
}

pub fn end_of_interrupt(irq: u8) {
    unsafe { PICS.lock().notify_end_of_interrupt(irq) };
}

/// Handle a fault on IRQ7 or IRQ15: distinguish a genuine device interrupt
/// from a spurious one (no ISR bit set), bump the corresponding counter and
/// swallow it, sending EOI only when the cascade (IRQ15) demands one.
pub fn handle_possible_spurious(irq: u8) -> bool {
    let mut pics = PICS.lock();
    let spurious = unsafe { pics.is_spurious(irq) };
    if spurious {
        if irq == IRQ_SLAVE_LOWEST_PRIORITY {
            // The master must still see an EOI for the cascade line even
            // though the slave's own line was spurious.
            unsafe { pics.master.write_command(OCW2_EOI | IRQ_CASCADE) };
            SPURIOUS_SLAVE.fetch_add(1, core::sync::atomic::Ordering::Relaxed);
        } else {
            SPURIOUS_MASTER.fetch_add(1, core::sync::atomic::Ordering::Relaxed);
        }
    }
    spurious
}

pub fn spurious_count() -> (u32, u32) {
    (
        SPURIOUS_MASTER.load(core::sync::atomic::Ordering::Relaxed),
        SPURIOUS_SLAVE.load(core::sync::atomic::Ordering::Relaxed),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn irq_classification() {
        let pics = ChainedPics::new();
        assert!(pics.master.handles(0));
        assert!(pics.master.handles(7));
        assert!(!pics.master.handles(8));
        assert!(pics.slave.handles(8));
        assert!(pics.slave.handles(15));
    }
}
