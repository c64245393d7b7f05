//! Runtime access to the flat disk image `image-builder` produced: sector 0
//! bootblock, sectors 1..K kernel, sector K+1 the process directory (VM
//! mode only), sectors K+2.. the user-process images.
//!
//! There is no disk driver in this kernel — the bootblock that loaded us
//! is an external collaborator, and by
//! construction it copies the whole image into physical memory
//! contiguously, one sector per `SECTOR_SIZE` bytes, before jumping to
//! `_start`. So the runtime address of on-disk sector N is recoverable as
//! `IMAGE_BASE_PADDR + N * SECTOR_SIZE`, and the kernel's own size (and
//! hence where the process directory starts) is recoverable from the
//! linker-provided `__kernel_end` symbol.

use crate::layout::{IMAGE_BASE_PADDR, KERNEL_PADDR, SECTOR_SIZE};

extern "C" {
    static __kernel_end: u8;
}

/// Number of sectors the kernel image occupies (sectors 1..=K).
pub fn kernel_sector_count() -> usize {
    let end = unsafe { core::ptr::addr_of!(__kernel_end) } as usize;
    let size = end.saturating_sub(KERNEL_PADDR);
    size.div_ceil(SECTOR_SIZE)
}

/// Physical address of on-disk sector `sector`, given the bootblock loaded
/// the whole image contiguously starting at `IMAGE_BASE_PADDR`.
pub fn sector_paddr(sector: u32) -> usize {
    IMAGE_BASE_PADDR + sector as usize * SECTOR_SIZE
}

/// Physical address of the process directory sector (sector K+1), valid
/// only when the image was built with `--vm`. Callers that don't know
/// whether VM mode was used treat the sector's contents (a `{0,0}`
/// terminator at record 0 if there are no processes) as the signal.
pub fn process_directory_paddr() -> usize {
    sector_paddr(1 + kernel_sector_count() as u32)
}

/// Read the raw 512-byte process directory sector.
///
/// # Safety
/// Caller must ensure the bootblock actually laid out a VM-mode image;
/// reading a non-VM image's corresponding memory is harmless (it reads
/// whatever bytes happen to follow the kernel) but meaningless.
pub unsafe fn process_directory_sector() -> &'static [u8; SECTOR_SIZE] {
    unsafe { &*(process_directory_paddr() as *const [u8; SECTOR_SIZE]) }
}

/// One process directory record: `{start_sector, sector_count}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessDirEntry {
    pub start_sector: u32,
    pub sector_count: u32,
}

/// Decode the process directory's entries up to (not including) the
/// `{0,0}` terminator.
pub fn read_process_directory() -> heapless::Vec<ProcessDirEntry, 63> {
    let sector = unsafe { process_directory_sector() };
    let mut out = heapless::Vec::new();
    for chunk in sector.chunks_exact(8) {
        let start_sector = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let sector_count = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
        if start_sector == 0 && sector_count == 0 {
            break;
        }
        if out.push(ProcessDirEntry { start_sector, sector_count }).is_err() {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sector_paddr_matches_kernel_load_address() {
        assert_eq!(sector_paddr(1), KERNEL_PADDR);
        assert_eq!(sector_paddr(0), IMAGE_BASE_PADDR);
    }
}
