//! System-call dispatch table.
//!
//! `original_source/kernel/syscall.c` is a stub (`syscall_dispatch` just
//! calls `todo_use(fn); todo_noop();` for every number); the numbering table
//! and argument shapes here are new, not a port of existing logic. Entered
//! from `arch::x86::idt::common_trap_handler` on the
//! syscall vector; `dispatch` reads the incoming `TrapFrame`'s `eax`/`ebx`/
//! `ecx`/`edx` as `(number, arg1, arg2, arg3)` and returns the value the
//! caller sees back in `eax`.

pub mod uaccess;
pub mod validation;

use crate::arch::x86::trapframe::TrapFrame;
use crate::bootimage;
use crate::lib::error::Errno;
use crate::mm::admission;
use crate::process::{create, scheduler};
use crate::sync::mbox;

const SYS_YIELD: u32 = 0;
const SYS_EXIT: u32 = 1;
const SYS_GETPID: u32 = 2;
const SYS_GETPRIORITY: u32 = 3;
const SYS_SETPRIORITY: u32 = 4;
const SYS_CPUSPEED: u32 = 5;
const SYS_MBOX_OPEN: u32 = 6;
const SYS_MBOX_CLOSE: u32 = 7;
const SYS_MBOX_STAT: u32 = 8;
const SYS_MBOX_RECV: u32 = 9;
const SYS_MBOX_SEND: u32 = 10;
const SYS_GETCHAR: u32 = 11;
const SYS_READDIR: u32 = 12;
const SYS_LOADPROC: u32 = 13;

/// How often `loadproc`'s admission wait re-checks the frame pool.
const ADMISSION_POLL_MS: u32 = 50;

fn err(e: Errno) -> i32 {
    e.as_isize() as i32
}

fn mbox_err(e: mbox::MboxError) -> i32 {
    match e {
        mbox::MboxError::InvalidHandle => err(Errno::EINVAL),
        mbox::MboxError::NotOpen => err(Errno::EINVAL),
        mbox::MboxError::MessageTooLarge => err(Errno::EMSGSIZE),
    }
}

fn create_err(e: create::CreateError) -> i32 {
    match e {
        create::CreateError::NoFreePcb => err(Errno::EAGAIN),
        create::CreateError::NoKernelStackSlot => err(Errno::EAGAIN),
    }
}

/// Dispatch one syscall. Called with the `TrapFrame` the syscall trampoline
/// built; `eax` is the syscall number on entry and is overwritten with the
/// return value by the caller (`common_trap_handler`), not by this function.
pub fn dispatch(frame: &TrapFrame) -> i32 {
    let nr = frame.eax;
    let arg1 = frame.ebx;
    let arg2 = frame.ecx;
    let arg3 = frame.edx;

    if validation::validate_syscall_number(nr).is_err() {
        return err(Errno::ENOSYS);
    }

    #[cfg(feature = "syscall-verbose")]
    crate::debug!("syscall nr={} a1={:#x} a2={:#x} a3={:#x}", nr, arg1, arg2, arg3);

    match nr {
        SYS_YIELD => {
            scheduler::yield_cpu();
            0
        }
        SYS_EXIT => scheduler::exit_task(),
        SYS_GETPID => scheduler::getpid() as i32,
        SYS_GETPRIORITY => scheduler::getpriority(),
        SYS_SETPRIORITY => {
            scheduler::setpriority(arg1 as i32);
            0
        }
        SYS_CPUSPEED => crate::arch::x86::cpu::identify().mhz as i32,
        SYS_MBOX_OPEN => match validation::validate_mbox_handle(arg1) {
            Ok(q) => match mbox::mbox_open(q) {
                Ok(handle) => handle as i32,
                Err(e) => mbox_err(e),
            },
            Err(e) => err(e),
        },
        SYS_MBOX_CLOSE => match validation::validate_mbox_handle(arg1) {
            Ok(q) => match mbox::mbox_close(q) {
                Ok(()) => 0,
                Err(e) => mbox_err(e),
            },
            Err(e) => err(e),
        },
        SYS_MBOX_STAT => sys_mbox_stat(arg1, arg2 as *mut u8),
        SYS_MBOX_RECV => sys_mbox_recv(arg1, arg2 as *mut u8, arg3 as usize),
        SYS_MBOX_SEND => sys_mbox_send(arg1, arg2 as *const u8, arg3 as usize),
        SYS_GETCHAR => sys_getchar(arg1 as *mut u8),
        SYS_READDIR => sys_readdir(arg1 as *mut u8),
        SYS_LOADPROC => sys_loadproc(arg1, arg2, arg3 as i32),
        _ => err(Errno::ENOSYS),
    }
}

/// `mbox_stat(q, out)`: writes `{count: u32, space: u32}` (8 bytes) to `out`.
fn sys_mbox_stat(q: u32, out: *mut u8) -> i32 {
    let q = match validation::validate_mbox_handle(q) {
        Ok(q) => q,
        Err(e) => return err(e),
    };
    let (count, space) = match mbox::mbox_stat(q) {
        Ok(v) => v,
        Err(e) => return mbox_err(e),
    };
    let mut buf = [0u8; 8];
    buf[0..4].copy_from_slice(&(count as u32).to_le_bytes());
    buf[4..8].copy_from_slice(&(space as u32).to_le_bytes());
    match uaccess::copy_to_user(out, &buf) {
        Ok(()) => 0,
        Err(e) => err(e),
    }
}

/// `mbox_recv(q, out, cap)`: blocks until a message is queued, then copies
/// it (up to `mbox::MAX_MSG_SIZE` bytes) into `out`. Returns the message
/// length on success.
fn sys_mbox_recv(q: u32, out: *mut u8, cap: usize) -> i32 {
    let q = match validation::validate_mbox_handle(q) {
        Ok(q) => q,
        Err(e) => return err(e),
    };
    if cap < mbox::MAX_MSG_SIZE {
        return err(Errno::EINVAL);
    }
    if uaccess::validate_user_write(out, mbox::MAX_MSG_SIZE).is_err() {
        return err(Errno::EFAULT);
    }
    let mut local = [0u8; mbox::MAX_MSG_SIZE];
    match mbox::mbox_recv(q, &mut local) {
        Ok(len) => match uaccess::copy_to_user(out, &local[..len]) {
            Ok(()) => len as i32,
            Err(e) => err(e),
        },
        Err(e) => mbox_err(e),
    }
}

/// `mbox_send(q, body, len)`: blocks until there is room, then enqueues
/// `body[0..len]` as one message.
fn sys_mbox_send(q: u32, body: *const u8, len: usize) -> i32 {
    let q = match validation::validate_mbox_handle(q) {
        Ok(q) => q,
        Err(e) => return err(e),
    };
    if validation::validate_buffer_len(len).is_err() || len > mbox::MAX_MSG_SIZE {
        return err(Errno::EMSGSIZE);
    }
    let mut local = [0u8; mbox::MAX_MSG_SIZE];
    if uaccess::copy_from_user(body, &mut local[..len]).is_err() {
        return err(Errno::EFAULT);
    }
    match mbox::mbox_send(q, &local[..len]) {
        Ok(()) => 0,
        Err(e) => mbox_err(e),
    }
}

/// `getchar(out)`: blocks until a keypress is available, writes its ASCII
/// code to `*out`. Polls the PS/2 driver's buffer, yielding between polls
/// since there is no wait queue for "keyboard has data" in this kernel.
fn sys_getchar(out: *mut u8) -> i32 {
    if uaccess::validate_user_write(out, 1).is_err() {
        return err(Errno::EFAULT);
    }
    loop {
        if let Some(c) = crate::arch::x86::ps2_keyboard::read_char() {
            return match uaccess::put_user_u8(out, c as u8) {
                Ok(()) => 0,
                Err(e) => err(e),
            };
        }
        scheduler::yield_cpu();
    }
}

/// `readdir(out)`: copies the 512-byte process directory sector into `out`.
fn sys_readdir(out: *mut u8) -> i32 {
    let sector = unsafe { bootimage::process_directory_sector() };
    match uaccess::copy_to_user(out, sector.as_slice()) {
        Ok(()) => 0,
        Err(e) => err(e),
    }
}

/// `loadproc(start_sector, sector_count, priority)`: creates a new user
/// process whose image is the given sector range, after optionally running
/// admission control (`config::Config::schedule_process_launching`).
fn sys_loadproc(start_sector: u32, sector_count: u32, priority: i32) -> i32 {
    let sector_count = match validation::validate_sector_count(sector_count) {
        Ok(n) => n,
        Err(e) => return err(e),
    };

    let cfg = crate::config::get();
    if cfg.schedule_process_launching {
        let admitted = admission::admit(
            cfg.avg_pages_per_process,
            cfg.new_process_wait_ms,
            ADMISSION_POLL_MS,
            crate::process::sleep::msleep,
        );
        if admitted.is_err() {
            return err(Errno::EAGAIN);
        }
    }

    let base = bootimage::sector_paddr(start_sector) as u32;
    let limit = sector_count * crate::layout::SECTOR_SIZE as u32;
    match create::create_process(base, limit, priority) {
        Ok(idx) => crate::process::task::with_pcb(idx, |p| p.pid) as i32,
        Err(e) => create_err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_syscall_number_returns_enosys() {
        let frame = TrapFrame { eax: 200, ..TrapFrame::default() };
        assert_eq!(dispatch(&frame), Errno::ENOSYS.as_isize() as i32);
    }

    #[test]
    fn cpuspeed_returns_a_nonnegative_value() {
        let frame = TrapFrame { eax: SYS_CPUSPEED, ..TrapFrame::default() };
        assert!(dispatch(&frame) >= 0);
    }
}
