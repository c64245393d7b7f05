//! Admission control for new user processes.
//!
//! Creation of a new process may stall up to `new_process_wait_ms` waiting
//! for at least `avg_pages_per_process` unpinned frames to free up, rather
//! than starting a process straight into thrashing. `original_source/memory.c`
//! has no such check (any number of processes just race for `alloc_memory`
//! until it asserts); this is new code, configured by `config::Config`.

use crate::mm::frame::frames_free;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionError {
    /// The wait timed out without enough frames ever freeing up.
    TooMuchCompetition,
}

/// Block (via repeated short sleeps) until at least `avg_pages_per_process`
/// frames are free, or `wait_ms` elapses.
///
/// `sleep_ms` is injected so callers can use either the real scheduler
/// sleep (`process::sleep::msleep`) or a busy-wait, keeping this module
/// free of a hard dependency on the scheduler being initialized yet.
pub fn admit(
    avg_pages_per_process: usize,
    wait_ms: u32,
    poll_interval_ms: u32,
    mut sleep_ms: impl FnMut(u32),
) -> Result<(), AdmissionError> {
    if frames_free() >= avg_pages_per_process {
        return Ok(());
    }

    let mut waited = 0u32;
    while waited < wait_ms {
        sleep_ms(poll_interval_ms);
        waited += poll_interval_ms;
        if frames_free() >= avg_pages_per_process {
            return Ok(());
        }
    }

    Err(AdmissionError::TooMuchCompetition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::frame;

    #[test]
    fn admits_immediately_when_frames_available() {
        frame::init();
        let mut slept = false;
        let result = admit(1, 100, 10, |_| slept = true);
        assert_eq!(result, Ok(()));
        assert!(!slept);
    }

    #[test]
    fn times_out_when_pool_cannot_satisfy() {
        frame::init();
        let result = admit(crate::layout::PAGEABLE_PAGES + 1, 20, 10, |_| {});
        assert_eq!(result, Err(AdmissionError::TooMuchCompetition));
    }
}
