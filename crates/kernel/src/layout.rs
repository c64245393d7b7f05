//! Physical/virtual memory layout constants.
//!
//! These are the fixed addresses baked into the boot image and the paging
//! code. They are not discovered at runtime; changing them means changing
//! the bootblock and `image-builder` in lockstep.

/// Sector size used throughout the disk image (bytes).
pub const SECTOR_SIZE: usize = 512;
/// Size of a virtual-memory page (bytes).
pub const PAGE_SIZE: usize = 0x1000;

/// Physical address the bootblock loads the kernel image to.
pub const KERNEL_PADDR: usize = 0x8000;
/// Physical address sector 0 (the bootblock itself) occupies once the
/// bootblock has copied the whole flat image into memory contiguously,
/// one sector per `SECTOR_SIZE` bytes. `image-builder` lays sectors out in
/// exactly this order, so `bootimage::sector_paddr` can recover any
/// sector's runtime address from its on-disk index without a disk driver.
pub const IMAGE_BASE_PADDR: usize = KERNEL_PADDR - SECTOR_SIZE;
/// Top of the kernel's own boot-time stack.
pub const KERNEL_STACK_TOP: usize = 0x80000;
/// Start of the area reserved for per-task kernel stacks.
pub const THREAD_KSTACK_AREA_MIN: usize = 0x40000;
/// End of the per-task kernel stack area (exclusive).
pub const THREAD_KSTACK_AREA_MAX: usize = 0x80000;
/// Size reserved for each task's kernel stack within the above area.
pub const THREAD_KSTACK_SIZE: usize = 0x2000;

/// Start of the physical frame pool available for paging.
pub const PAGING_AREA_MIN_PADDR: usize = 0x100000;
/// End of the physical frame pool (exclusive). 33 pageable 4K frames above
/// `PAGING_AREA_MIN_PADDR`, matching the original kernel's `PAGEABLE_PAGES`.
pub const PAGEABLE_PAGES: usize = 33;
pub const PAGING_AREA_MAX_PADDR: usize =
    PAGING_AREA_MIN_PADDR + PAGEABLE_PAGES * PAGE_SIZE;

/// Base virtual address every user process is linked and loaded at.
pub const USER_VADDR: usize = 0x0100_0000;
/// Top of the per-process user stack (grows down from here).
pub const USER_STACK_TOP: usize = 0xEFFF_FFF0;

/// Physical address of the VGA text-mode frame buffer (identity mapped,
/// user-accessible — out of scope for this kernel's own code, but user
/// processes loaded from the image may write to it directly).
pub const VGA_TEXT_PADDR: usize = 0xB8000;

/// Size of the region identity-mapped with kernel privileges below 1MiB.
pub const LOW_MEM_LIMIT: usize = 640 * 1024;

/// Fixed-capacity task table size (PCB table).
pub const PCB_TABLE_SIZE: usize = 128;

/// CPU interrupt vector hardware IRQ 0 is remapped to. Vectors 32..48 are
/// IRQs 0..15.
pub const IVEC_IRQ0: u8 = 32;
/// Vector used for the syscall software-interrupt gate.
pub const IVEC_SYSCALL: u8 = 48;
/// Total number of populated IDT entries (0..48 exceptions/IRQs, 48 syscall).
pub const IDT_SIZE: usize = 49;

/// Number of mailbox slots, mirroring `original_source/mbox.c`'s `MAX_MBOX`.
pub const MAX_MBOX: usize = 8;
