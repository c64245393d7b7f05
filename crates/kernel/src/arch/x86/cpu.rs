//! CPUID-based vendor/model identification.
//!
//! Limited to what this kernel actually consults: vendor string,
//! family/model, and the clock-speed estimate surfaced through `cpuspeed`.
//! No AVX/SMEP/SMAP/PCID/x2APIC/FSGSBASE feature detection — a pedagogical
//! 32-bit kernel has no use for any of it.

use x86::cpuid::CpuId;

use super::tsc;

pub struct CpuInfo {
    pub vendor: [u8; 12],
    pub family: u8,
    pub model: u8,
    pub mhz: u32,
}

pub fn identify() -> CpuInfo {
    let cpuid = CpuId::new();
    let mut vendor = [0u8; 12];
    if let Some(vf) = cpuid.get_vendor_info() {
        let s = vf.as_str();
        let bytes = s.as_bytes();
        let n = bytes.len().min(12);
        vendor[..n].copy_from_slice(&bytes[..n]);
    }
    let (family, model) = cpuid
        .get_feature_info()
        .map(|fi| (fi.family_id(), fi.model_id()))
        .unwrap_or((0, 0));

    CpuInfo {
        vendor,
        family,
        model,
        mhz: tsc::cpu_mhz(),
    }
}

pub fn halt() {
    unsafe { x86::halt() };
}

pub fn disable_interrupts() {
    unsafe { x86::irq::disable() };
}

pub fn enable_interrupts() {
    unsafe { x86::irq::enable() };
}

pub fn interrupts_enabled() -> bool {
    x86::bits32::eflags::read().contains(x86::bits32::eflags::EFlags::FLAGS_IF)
}

/// Faulting linear address, as left by the CPU in `cr2` on a page fault.
pub fn read_fault_address() -> u32 {
    unsafe { x86::controlregs::cr2() as u32 }
}
