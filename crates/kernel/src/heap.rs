//! Kernel heap allocator.
//!
//! Backs `alloc` with `linked_list_allocator::LockedHeap` over a static,
//! cache-line-aligned byte array (no dynamic backing store exists this early
//! in boot; the frame pool in `mm` is reserved for user/paged memory).
//! `StatsTrackingAllocator` wraps it to keep the running
//! counters the panic handler and `printk` diagnostics report.

use core::alloc::{GlobalAlloc, Layout};
use core::sync::atomic::{AtomicBool, Ordering};
use linked_list_allocator::LockedHeap;
use spin::Mutex;

#[repr(align(64))]
struct CacheAlignedArray([u8; HEAP_SIZE]);

static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Heap size: generous relative to the kernel's own working set, since this
/// is a teaching kernel with no swap for kernel memory itself.
const HEAP_SIZE: usize = 1024 * 1024;

pub const fn heap_total_size() -> usize {
    HEAP_SIZE
}

static HEAP_INIT_DONE: AtomicBool = AtomicBool::new(false);

/// Initialize the kernel heap. Idempotent; safe to call more than once.
pub fn init_heap() {
    if HEAP_INIT_DONE
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_ok()
    {
        unsafe {
            static mut HEAP_MEMORY: CacheAlignedArray = CacheAlignedArray([0; HEAP_SIZE]);
            let heap_arr_ptr = core::ptr::addr_of_mut!(HEAP_MEMORY);
            let heap_start = core::ptr::addr_of_mut!((*heap_arr_ptr).0) as *mut u8;
            ALLOCATOR.lock().init(heap_start, HEAP_SIZE);
        }
        crate::info!("heap: {} KiB at boot-image static region", HEAP_SIZE / 1024);
    }
}

/// Heap statistics for panic/debug diagnostics.
#[derive(Clone, Copy)]
pub struct HeapStats {
    total_allocations: usize,
    total_deallocations: usize,
    current_allocated: usize,
    peak_allocated: usize,
    allocation_failures: usize,
}

impl HeapStats {
    pub fn total_allocations(&self) -> usize {
        self.total_allocations
    }
    pub fn total_deallocations(&self) -> usize {
        self.total_deallocations
    }
    pub fn current_allocated(&self) -> usize {
        self.current_allocated
    }
    pub fn peak_allocated(&self) -> usize {
        self.peak_allocated
    }
    pub fn allocation_failures(&self) -> usize {
        self.allocation_failures
    }
}

static HEAP_STATS: Mutex<HeapStats> = Mutex::new(HeapStats {
    total_allocations: 0,
    total_deallocations: 0,
    current_allocated: 0,
    peak_allocated: 0,
    allocation_failures: 0,
});

pub struct StatsTrackingAllocator;

unsafe impl GlobalAlloc for StatsTrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = ALLOCATOR.alloc(layout);
        let mut stats = HEAP_STATS.lock();
        if !ptr.is_null() {
            stats.total_allocations += 1;
            stats.current_allocated += layout.size();
            if stats.current_allocated > stats.peak_allocated {
                stats.peak_allocated = stats.current_allocated;
            }
        } else {
            stats.allocation_failures += 1;
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        let mut stats = HEAP_STATS.lock();
        stats.total_deallocations += 1;
        stats.current_allocated = stats.current_allocated.saturating_sub(layout.size());
        drop(stats);
        ALLOCATOR.dealloc(ptr, layout);
    }
}

#[global_allocator]
static GLOBAL_ALLOC: StatsTrackingAllocator = StatsTrackingAllocator;

#[alloc_error_handler]
fn alloc_error_handler(layout: Layout) -> ! {
    crate::error!(
        "heap: allocation failure, size={} align={}",
        layout.size(),
        layout.align()
    );
    loop {
        crate::arch::x86::cpu::halt();
    }
}

pub fn get_heap_stats() -> HeapStats {
    *HEAP_STATS.lock()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_size_is_page_aligned() {
        assert_eq!(HEAP_SIZE % crate::layout::PAGE_SIZE, 0);
    }
}
