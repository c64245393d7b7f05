//! Page directory / page table construction.
//!
//! Grounded on `original_source/kernel/memory.c`: `table_map_page`,
//! `dir_ins_table`, `make_common_map`, `setup_kernel_vmem`, and
//! `setup_process_vmem`, translated field-for-field. A directory/table is
//! a plain `[u32; 1024]` frame, same layout the hardware MMU expects
//! (PMSA p.235/p.240), addressed by physical pointer since the kernel runs
//! identity-mapped.

use crate::layout::{LOW_MEM_LIMIT, PAGE_SIZE, PAGING_AREA_MAX_PADDR, PAGING_AREA_MIN_PADDR, VGA_TEXT_PADDR};
use crate::mm::frame::allocate_page;

const ENTRIES_PER_TABLE: usize = 1024;

pub const PE_PRESENT: u32 = 1 << 0;
pub const PE_RW: u32 = 1 << 1;
pub const PE_USER: u32 = 1 << 2;
const PE_BASE_ADDR_MASK: u32 = 0xFFFF_F000;

const DIRECTORY_SHIFT: u32 = 22;
const TABLE_SHIFT: u32 = 12;
const TABLE_MASK: u32 = 0x003F_F000;

fn directory_index(vaddr: u32) -> usize {
    (vaddr >> DIRECTORY_SHIFT) as usize
}

fn table_index(vaddr: u32) -> usize {
    ((vaddr & TABLE_MASK) >> TABLE_SHIFT) as usize
}

fn as_table(paddr: u32) -> &'static mut [u32; ENTRIES_PER_TABLE] {
    unsafe { &mut *(paddr as *mut [u32; ENTRIES_PER_TABLE]) }
}

/// Map a single page inside an already-allocated page table.
pub fn table_map_page(table_paddr: u32, vaddr: u32, paddr: u32, mode: u32) {
    let table = as_table(table_paddr);
    let idx = table_index(vaddr);
    table[idx] = (paddr & PE_BASE_ADDR_MASK) | (mode & !PE_BASE_ADDR_MASK);
}

/// Insert a page table into a page directory at the slot `vaddr` falls in.
pub fn dir_insert_table(directory_paddr: u32, vaddr: u32, table_paddr: u32, mode: u32) {
    let dir = as_table(directory_paddr);
    let idx = directory_index(vaddr);
    dir[idx] = (table_paddr & PE_BASE_ADDR_MASK) | (mode & 0x3FF);
}

/// Physical address of the page table that backs `vaddr` in `directory_paddr`.
pub fn dir_entry_table_paddr(directory_paddr: u32, vaddr: u32) -> u32 {
    let dir = as_table(directory_paddr);
    dir[directory_index(vaddr)] & PE_BASE_ADDR_MASK
}

/// Build the mapping every address space needs regardless of which process
/// it belongs to: identity-map the first 640 KiB and the paging area with
/// kernel privilege, and the VGA text page with the given user bit (raised
/// for user directories so a process can write the screen directly).
fn make_common_map(directory_paddr: u32, user: bool) {
    let kernel_mode = PE_PRESENT | PE_RW;
    let user_mode = PE_PRESENT | PE_RW | if user { PE_USER } else { 0 };

    let table_paddr = allocate_page() as u32;

    let mut addr = 0u32;
    while (addr as usize) < LOW_MEM_LIMIT {
        table_map_page(table_paddr, addr, addr, kernel_mode);
        addr += PAGE_SIZE as u32;
    }

    table_map_page(table_paddr, VGA_TEXT_PADDR as u32, VGA_TEXT_PADDR as u32, user_mode);

    let mut addr = PAGING_AREA_MIN_PADDR as u32;
    while (addr as usize) < PAGING_AREA_MAX_PADDR {
        table_map_page(table_paddr, addr, addr, kernel_mode);
        addr += PAGE_SIZE as u32;
    }

    dir_insert_table(directory_paddr, 0, table_paddr, user_mode);
}

static KERNEL_PDIR: spin::Mutex<Option<u32>> = spin::Mutex::new(None);

/// Build the kernel's own page directory, shared by every kernel thread.
/// Called once from `mm::init`.
pub fn setup_kernel_vmem() -> u32 {
    let pdir = allocate_page() as u32;
    make_common_map(pdir, false);
    *KERNEL_PDIR.lock() = Some(pdir);
    pdir
}

pub fn kernel_page_directory() -> u32 {
    KERNEL_PDIR.lock().expect("setup_kernel_vmem not yet called")
}

/// Build the page directory (and, for a process, the user-window page
/// table) for a newly created task. Returns the physical address to store
/// in `pcb.page_directory`.
///
/// `base`/`limit` describe the physical frames backing the process image,
/// already allocated by the caller; they are mapped starting at
/// `crate::layout::USER_VADDR`.
pub fn setup_task_vmem(is_thread: bool, base: u32, limit: u32) -> u32 {
    if is_thread {
        return kernel_page_directory();
    }

    let directory_paddr = allocate_page() as u32;
    make_common_map(directory_paddr, true);

    let user_mode = PE_PRESENT | PE_RW | PE_USER;
    let user_table = allocate_page() as u32;
    dir_insert_table(directory_paddr, crate::layout::USER_VADDR as u32, user_table, user_mode);

    let mut offset = 0u32;
    while offset < limit {
        let paddr = base + offset;
        let vaddr = crate::layout::USER_VADDR as u32 + offset;
        table_map_page(user_table, vaddr, paddr, user_mode);
        offset += PAGE_SIZE as u32;
    }

    directory_paddr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_index_picks_4mb_region() {
        assert_eq!(directory_index(0), 0);
        assert_eq!(directory_index(0x0100_0000), 4);
    }

    #[test]
    fn table_index_wraps_modulo_1024() {
        assert_eq!(table_index(0x0100_1000), 1);
    }
}
