//! Kernel configuration knobs.
//!
//! `original_source/kernel/config.h` hardcodes these as preprocessor flags
//! (with a long comment documenting which combinations the original authors
//! found stable under load). We carry the same six knobs forward as a typed
//! record read once at boot, rather than as scattered `cfg!`/`const` flags.

use crate::mm::eviction::Strategy;

/// Boot-time configuration. Read once by `arch::x86::boot::early_init` and
/// handed to the subsystems that consult it; not mutable afterward.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// `original_source/config.h`'s `PROCESSES_SHARE_KERNEL_PAGE_TABLE`.
    /// Whether every process address space reuses one shared kernel page
    /// table instead of each pinning its own copy. Informational here: this
    /// port's `mm::pagetable::make_common_map` always builds a fresh kernel
    /// mapping per directory (simpler, and this kernel's frame budget is
    /// generous enough not to need the sharing optimization the original
    /// authors were chasing); kept as a field so a future change to
    /// `make_common_map` has a knob to read, per the stable/unstable
    /// settings trade-off `config.h` documents.
    pub processes_share_kernel_page_table: bool,
    /// `PIN_SHELL`: exempt one designated process (the shell, in the
    /// original) from eviction. Not wired to a concrete "shell" process in
    /// this port, which has no shell — kept as a carried-forward knob.
    pub pin_shell: bool,
    /// `EVICTION_STRATEGY`.
    pub eviction: Strategy,
    /// `SCHEDULE_PROCESS_LAUNCHING`: when true, `loadproc` and kernel-init
    /// process creation go through `mm::admission::admit` first instead of
    /// racing straight for frames.
    pub schedule_process_launching: bool,
    /// `AVERAGE_PAGES_PER_PROCESS`.
    pub avg_pages_per_process: usize,
    /// `NEW_PROCESS_WAIT_TIME_FOR_PAGES`, in milliseconds.
    pub new_process_wait_ms: u32,
}

impl Config {
    /// The "stable settings" combination `config.h` recommends: limit the
    /// number of concurrently launching processes and share kernel page
    /// tables, FIFO eviction.
    const fn stable() -> Self {
        Self {
            processes_share_kernel_page_table: true,
            pin_shell: false,
            eviction: Strategy::Fifo,
            schedule_process_launching: true,
            avg_pages_per_process: 7,
            new_process_wait_ms: 1000,
        }
    }
}

static CONFIG: Config = Config::stable();

/// The active configuration. A plain `'static` reference to a `const`
/// value: a configuration record read once at init, and since nothing in
/// this kernel mutates it after boot, a `const` plays that role without
/// needing a lock.
pub fn get() -> &'static Config {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_defaults_match_original_source_config_h() {
        let c = get();
        assert_eq!(c.eviction, Strategy::Fifo);
        assert_eq!(c.avg_pages_per_process, 7);
        assert_eq!(c.new_process_wait_ms, 1000);
        assert!(c.schedule_process_launching);
        assert!(!c.pin_shell);
    }
}
