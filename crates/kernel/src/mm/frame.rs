//! Physical frame pool: bump allocator plus per-frame eviction bookkeeping.
//!
//! Grounded on `original_source/kernel/memory.c`'s `alloc_memory`/
//! `allocate_page`: bump a high-water pointer under a spinlock, refusing
//! once it would cross `PAGING_AREA_MAX_PADDR`, zero the frame before
//! handing it out. Unlike the original (which never reclaims), each bumped
//! frame also gets an entry in `FRAMES` recording ownership and pin state,
//! so `mm::eviction` has something to choose a victim from once the pool
//! is exhausted.

use crate::layout::{PAGEABLE_PAGES, PAGE_SIZE, PAGING_AREA_MAX_PADDR, PAGING_AREA_MIN_PADDR};
use crate::sync::Spinlock;

#[derive(Debug, Clone, Copy)]
pub struct FrameMeta {
    pub in_use: bool,
    pub pinned: bool,
    /// Owning task's PCB table index, if this frame backs user memory.
    pub owner: Option<usize>,
    /// Virtual address this frame is currently mapped at, for TLB
    /// invalidation and page-table-entry clearing on eviction.
    pub owner_vaddr: u32,
    /// Disk sector this frame's contents should be written back to /
    /// re-read from: the sector the page was first demand-loaded from.
    pub origin_sector: u32,
    /// Monotonic insertion order, for the FIFO eviction strategy.
    pub insertion_seq: u64,
}

impl FrameMeta {
    const fn empty() -> Self {
        Self {
            in_use: false,
            pinned: false,
            owner: None,
            owner_vaddr: 0,
            origin_sector: 0,
            insertion_seq: 0,
        }
    }
}

struct FramePool {
    next_free: usize,
    seq: u64,
    frames: [FrameMeta; PAGEABLE_PAGES],
    /// Frames reclaimed by `free_frame` (e.g. a reaped process's page
    /// directory/tables/image pages), reused before the bump pointer is
    /// advanced any further.
    freed: heapless::Vec<usize, PAGEABLE_PAGES>,
}

static NEXT_FREE: Spinlock = Spinlock::new();
static POOL: spin::Mutex<FramePool> = spin::Mutex::new(FramePool {
    next_free: PAGING_AREA_MIN_PADDR,
    seq: 0,
    frames: [FrameMeta::empty(); PAGEABLE_PAGES],
    freed: heapless::Vec::new(),
});

fn frame_index(paddr: usize) -> usize {
    (paddr - PAGING_AREA_MIN_PADDR) / PAGE_SIZE
}

/// Reset the pool to entirely free. Called once during `mm::init`.
pub fn init() {
    let mut p = POOL.lock();
    p.next_free = PAGING_AREA_MIN_PADDR;
    p.seq = 0;
    p.frames = [FrameMeta::empty(); PAGEABLE_PAGES];
    p.freed.clear();
}

/// Allocate `bytes` worth of contiguous, page-aligned physical memory by
/// bumping the high-water pointer. Zeroes the memory before returning.
///
/// # Panics
/// If the bump would cross `PAGING_AREA_MAX_PADDR` ("Memory exhausted!" in
/// the original); callers needing graceful exhaustion handling (the
/// eviction path) must check `frames_free()` first instead.
pub fn alloc_frames(bytes: usize) -> usize {
    NEXT_FREE.acquire();
    let mut p = POOL.lock();
    let ptr = p.next_free;
    let mut next = p.next_free + bytes;
    if next & (PAGE_SIZE - 1) != 0 {
        next = (next & !(PAGE_SIZE - 1)) + PAGE_SIZE;
    }
    assert!(next <= PAGING_AREA_MAX_PADDR, "Memory exhausted!");
    p.next_free = next;

    let seq = p.seq;
    p.seq += 1;
    if ptr >= PAGING_AREA_MIN_PADDR && ptr < PAGING_AREA_MAX_PADDR {
        let idx = frame_index(ptr);
        p.frames[idx] = FrameMeta {
            in_use: true,
            insertion_seq: seq,
            ..FrameMeta::empty()
        };
    }
    drop(p);
    NEXT_FREE.release();

    zero_frame(ptr, bytes);
    ptr
}

/// Allocate a single zeroed, page-aligned frame. Reuses a frame freed by
/// `free_frame` if one is available, rather than always bumping the
/// high-water pointer -- without this, a reaped process's frames would
/// never come back into circulation and `mm::admission` would eventually
/// wedge every future process launch.
pub fn allocate_page() -> usize {
    NEXT_FREE.acquire();
    let reused = {
        let mut p = POOL.lock();
        p.freed.pop().map(|paddr| {
            let seq = p.seq;
            p.seq += 1;
            let idx = frame_index(paddr);
            p.frames[idx] = FrameMeta {
                in_use: true,
                insertion_seq: seq,
                ..FrameMeta::empty()
            };
            paddr
        })
    };
    NEXT_FREE.release();

    match reused {
        Some(paddr) => {
            zero_frame(paddr, PAGE_SIZE);
            paddr
        }
        None => alloc_frames(PAGE_SIZE),
    }
}

/// Return a frame to the pool for reuse by a future `allocate_page`. The
/// caller must already have cleared the owning page-table entry and
/// flushed the relevant TLB entry; this only resets the pool's own
/// bookkeeping.
pub fn free_frame(paddr: usize) {
    if !(PAGING_AREA_MIN_PADDR..PAGING_AREA_MAX_PADDR).contains(&paddr) {
        return;
    }
    NEXT_FREE.acquire();
    let mut p = POOL.lock();
    let idx = frame_index(paddr);
    p.frames[idx] = FrameMeta::empty();
    let _ = p.freed.push(paddr);
    NEXT_FREE.release();
}

/// Free every pageable-pool frame currently owned by `task` (its
/// demand-loaded image pages). Called when reaping an EXITED process.
pub fn free_owned_by(task: usize) {
    let mut owned: heapless::Vec<usize, PAGEABLE_PAGES> = heapless::Vec::new();
    {
        let p = POOL.lock();
        for (idx, meta) in p.frames.iter().enumerate() {
            if meta.in_use && meta.owner == Some(task) {
                let _ = owned.push(PAGING_AREA_MIN_PADDR + idx * PAGE_SIZE);
            }
        }
    }
    for paddr in owned {
        free_frame(paddr);
    }
}

fn zero_frame(paddr: usize, bytes: usize) {
    unsafe {
        core::ptr::write_bytes(paddr as *mut u8, 0, bytes);
    }
}

pub fn mark_pinned(paddr: usize, pinned: bool) {
    if !(PAGING_AREA_MIN_PADDR..PAGING_AREA_MAX_PADDR).contains(&paddr) {
        return;
    }
    let mut p = POOL.lock();
    let idx = frame_index(paddr);
    p.frames[idx].pinned = pinned;
}

pub fn set_owner(paddr: usize, owner: usize, vaddr: u32, origin_sector: u32) {
    if !(PAGING_AREA_MIN_PADDR..PAGING_AREA_MAX_PADDR).contains(&paddr) {
        return;
    }
    let mut p = POOL.lock();
    let idx = frame_index(paddr);
    p.frames[idx].owner = Some(owner);
    p.frames[idx].owner_vaddr = vaddr;
    p.frames[idx].origin_sector = origin_sector;
}

pub fn frame_meta(paddr: usize) -> Option<FrameMeta> {
    if !(PAGING_AREA_MIN_PADDR..PAGING_AREA_MAX_PADDR).contains(&paddr) {
        return None;
    }
    let p = POOL.lock();
    Some(p.frames[frame_index(paddr)])
}

/// Frames available for a future allocation: never handed out by the bump
/// allocator, plus any reclaimed by `free_frame` and not yet reused.
pub fn frames_free() -> usize {
    let p = POOL.lock();
    (PAGING_AREA_MAX_PADDR - p.next_free) / PAGE_SIZE + p.freed.len()
}

/// Iterate the metadata of every frame currently tracked, physical address
/// alongside its bookkeeping, for the eviction policy to scan.
pub fn for_each_frame(mut f: impl FnMut(usize, &FrameMeta)) {
    let p = POOL.lock();
    for (idx, meta) in p.frames.iter().enumerate() {
        if meta.in_use {
            f(PAGING_AREA_MIN_PADDR + idx * PAGE_SIZE, meta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_bumps_and_aligns() {
        init();
        let a = allocate_page();
        let b = allocate_page();
        assert_eq!(a % PAGE_SIZE, 0);
        assert_eq!(b - a, PAGE_SIZE as usize);
    }

    #[test]
    fn frames_free_shrinks_on_alloc() {
        init();
        let before = frames_free();
        allocate_page();
        assert_eq!(frames_free(), before - 1);
    }

    #[test]
    fn freed_frame_is_reused_before_bumping_further() {
        init();
        let a = allocate_page();
        free_frame(a);
        let before = frames_free();
        let b = allocate_page();
        assert_eq!(b, a, "allocate_page should reuse the freed frame first");
        assert_eq!(frames_free(), before - 1);
    }

    #[test]
    fn free_owned_by_reclaims_only_that_tasks_frames() {
        init();
        let a = allocate_page();
        let b = allocate_page();
        set_owner(a, 1, 0, 0);
        set_owner(b, 2, 0, 0);

        free_owned_by(1);

        assert!(!frame_meta(a).unwrap().in_use);
        assert!(frame_meta(b).unwrap().in_use);
        assert_eq!(frame_meta(b).unwrap().owner, Some(2));
    }
}
