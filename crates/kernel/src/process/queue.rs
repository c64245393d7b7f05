//! Ring-queue operations over PCB table indices.
//!
//! Grounded on `pcb.c`'s `queue_insert`/`queue_shift`/`queue_remove`/
//! `queue_pos`, translated from pointer splicing to index splicing (this
//! kernel's PCB table is a fixed array, not heap-allocated nodes). A queue
//! is identified by its head, `Option<usize>`;
//! `None` means empty. Each task's `next`/`previous` fields (in `task::Pcb`)
//! are the ring links, exactly as in the original.

use crate::layout::PCB_TABLE_SIZE;
use crate::process::task::with_pcb_mut;

/// Insert task `p` into queue `q`. `p` must not currently be linked into
/// any other queue (both of its links must be `None`).
pub fn queue_insert(q: &mut Option<usize>, p: usize) {
    match *q {
        None => {
            with_pcb_mut(p, |pcb| {
                pcb.next = Some(p);
                pcb.previous = Some(p);
            });
            *q = Some(p);
        }
        Some(head) => {
            let tail = with_pcb_mut(head, |pcb| pcb.previous.unwrap());
            with_pcb_mut(p, |pcb| {
                pcb.previous = Some(tail);
                pcb.next = Some(head);
            });
            with_pcb_mut(tail, |pcb| pcb.next = Some(p));
            with_pcb_mut(head, |pcb| pcb.previous = Some(p));
        }
    }
}

/// Remove and return the head of `q`. Returns `None` iff `q` was empty.
pub fn queue_shift(q: &mut Option<usize>) -> Option<usize> {
    let head = (*q)?;
    let (next, previous) = with_pcb_mut(head, |pcb| (pcb.next.unwrap(), pcb.previous.unwrap()));

    if next == head && previous == head {
        *q = None;
    } else {
        with_pcb_mut(previous, |pcb| pcb.next = Some(next));
        with_pcb_mut(next, |pcb| pcb.previous = Some(previous));
        *q = Some(next);
    }

    with_pcb_mut(head, |pcb| {
        pcb.next = None;
        pcb.previous = None;
    });
    Some(head)
}

/// Find the offset of `p` within `q`, or `None` if it is not in the ring.
/// Mirrors `queue_pos`'s wrap-detection and malformed-ring assertions.
fn queue_pos(q: &Option<usize>, p: usize) -> Option<usize> {
    let start = (*q)?;
    let mut cur = start;
    let mut i = 0;
    loop {
        if cur == p {
            return Some(i);
        }
        cur = with_pcb_mut(cur, |pcb| pcb.next.expect("malformed queue does not wrap"));
        i += 1;
        assert!(i <= PCB_TABLE_SIZE, "malformed queue goes too far");
        if cur == start {
            return None;
        }
    }
}

/// Remove `p` from queue `q`. `p` must currently be a member of `q`.
pub fn queue_remove(q: &mut Option<usize>, p: usize) {
    assert!(queue_pos(q, p).is_some(), "thread must be in queue to remove");

    let (next, previous) = with_pcb_mut(p, |pcb| (pcb.next.unwrap(), pcb.previous.unwrap()));

    if *q == Some(p) && next == p {
        *q = None;
    } else if *q == Some(p) {
        *q = Some(next);
    }

    with_pcb_mut(previous, |pcb| pcb.next = Some(next));
    with_pcb_mut(next, |pcb| pcb.previous = Some(previous));
    with_pcb_mut(p, |pcb| {
        pcb.next = None;
        pcb.previous = None;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::task::{alloc_pcb, free_pcb, init_pcb_table, Kind};

    #[test]
    fn insert_shift_roundtrip() {
        init_pcb_table();
        let a = alloc_pcb(Kind::Thread, 0, 0).unwrap();
        let b = alloc_pcb(Kind::Thread, 0, 0).unwrap();
        let c = alloc_pcb(Kind::Thread, 0, 0).unwrap();

        let mut q = None;
        queue_insert(&mut q, a);
        queue_insert(&mut q, b);
        queue_insert(&mut q, c);

        assert_eq!(queue_shift(&mut q), Some(a));
        assert_eq!(queue_shift(&mut q), Some(b));
        assert_eq!(queue_shift(&mut q), Some(c));
        assert_eq!(queue_shift(&mut q), None);

        free_pcb(a);
        free_pcb(b);
        free_pcb(c);
    }

    #[test]
    fn remove_from_middle() {
        init_pcb_table();
        let a = alloc_pcb(Kind::Thread, 0, 0).unwrap();
        let b = alloc_pcb(Kind::Thread, 0, 0).unwrap();
        let c = alloc_pcb(Kind::Thread, 0, 0).unwrap();

        let mut q = None;
        queue_insert(&mut q, a);
        queue_insert(&mut q, b);
        queue_insert(&mut q, c);

        queue_remove(&mut q, b);
        assert_eq!(queue_shift(&mut q), Some(a));
        assert_eq!(queue_shift(&mut q), Some(c));
        assert_eq!(queue_shift(&mut q), None);

        free_pcb(a);
        free_pcb(b);
        free_pcb(c);
    }

    #[test]
    fn single_element_queue_is_self_loop() {
        init_pcb_table();
        let a = alloc_pcb(Kind::Thread, 0, 0).unwrap();
        let mut q = None;
        queue_insert(&mut q, a);
        assert_eq!(q, Some(a));
        assert_eq!(queue_shift(&mut q), Some(a));
        assert_eq!(q, None);
        free_pcb(a);
    }
}
