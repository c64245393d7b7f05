//! Pluggable frame-eviction policy.
//!
//! Designed as a policy object with three operations (`on_install(frame)`,
//! `on_touch(frame)`, `choose_victim() -> frame`). `original_source/memory.c`
//! never evicts at all (no swap area beyond the source image itself), so
//! this module has no direct C counterpart; it is new code, configured by
//! `config::Eviction`.

use crate::layout::PAGEABLE_PAGES;
use crate::mm::frame::{for_each_frame, FrameMeta};
use crate::prng::rand_range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Fifo,
    Random,
}

/// Called whenever a frame is newly mapped in, so FIFO can track insertion
/// order. A no-op for Random, which samples fresh each time instead of
/// keeping history.
pub fn on_install(_paddr: usize, _strategy: Strategy) {}

/// Called on every access to an already-mapped frame. Reserved for an LRU
/// extension; unused by FIFO/Random, kept as a named hook to complete the
/// three-operation policy-object shape.
pub fn on_touch(_paddr: usize, _strategy: Strategy) {}

/// Pick a frame to evict among unpinned, in-use frames. `None` if every
/// tracked frame is pinned (admission should have prevented this).
pub fn choose_victim(strategy: Strategy) -> Option<usize> {
    match strategy {
        Strategy::Fifo => choose_fifo(),
        Strategy::Random => choose_random(),
    }
}

fn choose_fifo() -> Option<usize> {
    let mut best: Option<(usize, u64)> = None;
    for_each_frame(|paddr, meta: &FrameMeta| {
        if meta.pinned {
            return;
        }
        match best {
            Some((_, seq)) if seq <= meta.insertion_seq => {}
            _ => best = Some((paddr, meta.insertion_seq)),
        }
    });
    best.map(|(paddr, _)| paddr)
}

fn choose_random() -> Option<usize> {
    let mut candidates: heapless::Vec<usize, PAGEABLE_PAGES> = heapless::Vec::new();
    for_each_frame(|paddr, meta: &FrameMeta| {
        if !meta.pinned {
            let _ = candidates.push(paddr);
        }
    });
    if candidates.is_empty() {
        return None;
    }
    let i = rand_range(0, candidates.len() as u32) as usize;
    Some(candidates[i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::frame;

    #[test]
    fn fifo_picks_oldest_unpinned() {
        frame::init();
        let a = frame::allocate_page();
        let b = frame::allocate_page();
        frame::mark_pinned(a, true);
        let victim = choose_victim(Strategy::Fifo);
        assert_eq!(victim, Some(b));
    }

    #[test]
    fn all_pinned_has_no_victim() {
        frame::init();
        let a = frame::allocate_page();
        frame::mark_pinned(a, true);
        assert_eq!(choose_victim(Strategy::Fifo), None);
    }
}
