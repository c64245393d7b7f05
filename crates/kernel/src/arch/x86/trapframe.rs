//! The register frame saved by the interrupt/exception/syscall trampolines.
//!
//! Layout mirrors what `entry.S`-style trampolines push: general-purpose
//! registers saved by software (via `pushad`), then whatever the CPU itself
//! pushed on the interrupt (`error_code` for the exceptions that have one,
//! then `eip`/`cs`/`eflags`, and `esp`/`ss` only when the privilege level
//! changed). Handlers only read this; writing the trap frame to change
//! the resumed register set is unsupported here, matching scope.

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct TrapFrame {
    // Pushed by the trampoline (reverse `pushad` order: edi first out).
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub esp_dummy: u32, // pushad's esp snapshot, unused on restore
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    // Vector number and (possibly synthesized) hardware error code, pushed
    // by the per-vector trampoline stub before jumping to the common path.
    pub vector: u32,
    pub error_code: u32,
    // Pushed by the CPU itself on interrupt/exception entry.
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    // Only present/valid when entering from a lower privilege level
    // (ring 3 -> ring 0); zero otherwise.
    pub user_esp: u32,
    pub user_ss: u32,
}

impl TrapFrame {
    pub fn from_user_mode(&self) -> bool {
        (self.cs & 0x3) == 3
    }
}
