//! Syscall argument validation.
//!
//! Trimmed to the handful of checks this kernel's 14 syscalls actually need:
//! there are no file descriptors, sockets, or mmap flags here, only pointers,
//! buffer lengths, and a syscall number range.

use crate::lib::error::Errno;
use crate::process::create::KSTACK_SLOTS;

/// One past the highest syscall number this kernel dispatches.
pub const MAX_SYSCALL_NUM: u32 = 13;

/// Largest length any syscall accepts for a user buffer. Generous relative
/// to `mbox::MAX_MSG_SIZE`/sector size so it only catches obviously-bogus
/// arguments, not legitimate ones.
pub const MAX_BUFFER_LEN: usize = 4096;

pub fn validate_syscall_number(nr: u32) -> Result<u32, Errno> {
    if nr > MAX_SYSCALL_NUM {
        Err(Errno::ENOSYS)
    } else {
        Ok(nr)
    }
}

pub fn validate_buffer_len(len: usize) -> Result<usize, Errno> {
    if len > MAX_BUFFER_LEN {
        Err(Errno::EINVAL)
    } else {
        Ok(len)
    }
}

/// Mailbox handle bounds check, shared by the five mailbox syscalls.
pub fn validate_mbox_handle(q: u32) -> Result<usize, Errno> {
    let q = q as usize;
    if q >= crate::layout::MAX_MBOX {
        Err(Errno::EINVAL)
    } else {
        Ok(q)
    }
}

/// `loadproc`'s sector-count argument must be nonzero and small enough that
/// `sector_count * SECTOR_SIZE` cannot overflow `u32`.
pub fn validate_sector_count(sector_count: u32) -> Result<u32, Errno> {
    if sector_count == 0 || sector_count as usize > KSTACK_SLOTS * 64 {
        Err(Errno::EINVAL)
    } else {
        Ok(sector_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syscall_number_range() {
        assert!(validate_syscall_number(0).is_ok());
        assert!(validate_syscall_number(13).is_ok());
        assert_eq!(validate_syscall_number(14), Err(Errno::ENOSYS));
    }

    #[test]
    fn buffer_len_range() {
        assert!(validate_buffer_len(MAX_BUFFER_LEN).is_ok());
        assert_eq!(validate_buffer_len(MAX_BUFFER_LEN + 1), Err(Errno::EINVAL));
    }

    #[test]
    fn mbox_handle_range() {
        assert!(validate_mbox_handle(0).is_ok());
        assert_eq!(
            validate_mbox_handle(crate::layout::MAX_MBOX as u32),
            Err(Errno::EINVAL)
        );
    }
}
