//! Mailbox IPC.
//!
//! Grounded on `original_source/kernel/mbox.c`'s shape (a fixed `Q[MAX_MBOX]`
//! table, a lock plus "space available"/"message available" condition
//! variables guarding a circular byte buffer) but with real semantics: the
//! original is a `todo_noop()` stub throughout. `mbox_send` blocks while
//! full, `mbox_recv` blocks while empty, and `mbox_open`/`mbox_close` refcount a
//! mailbox so a send/recv pair (`process3`/`process4` in the original) can
//! rendezvous without either side needing to create the mailbox first.

use crate::layout::MAX_MBOX;
use crate::sync::condvar::Condvar;
use crate::sync::lock::Lock;

/// Per-mailbox buffer capacity in bytes, including message headers.
pub const BUFFER_SIZE: usize = 512;

/// Largest single message body, mirroring `process4.c`'s `MAX_MSG_SIZE`.
pub const MAX_MSG_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MboxError {
    InvalidHandle,
    NotOpen,
    MessageTooLarge,
}

struct Mailbox {
    refcount: u32,
    head: usize,
    tail: usize,
    count: usize,
    buffer: [u8; BUFFER_SIZE],
    lock: Lock,
    space_available: Condvar,
    data_available: Condvar,
}

impl Mailbox {
    const fn new() -> Self {
        Self {
            refcount: 0,
            head: 0,
            tail: 0,
            count: 0,
            buffer: [0; BUFFER_SIZE],
            lock: Lock::new(),
            space_available: Condvar::new(),
            data_available: Condvar::new(),
        }
    }

    fn bytes_used(&self) -> usize {
        if self.count == 0 {
            0
        } else if self.head >= self.tail {
            self.head - self.tail
        } else {
            self.head + BUFFER_SIZE - self.tail
        }
    }

    fn bytes_free(&self) -> usize {
        BUFFER_SIZE - self.bytes_used()
    }

    fn push_byte(&mut self, b: u8) {
        self.buffer[self.head] = b;
        self.head = (self.head + 1) % BUFFER_SIZE;
    }

    fn pop_byte(&mut self) -> u8 {
        let b = self.buffer[self.tail];
        self.tail = (self.tail + 1) % BUFFER_SIZE;
        b
    }
}

struct MailboxTable {
    boxes: [Mailbox; MAX_MBOX],
}

static TABLE: spin::Mutex<MailboxTable> = spin::Mutex::new(MailboxTable {
    boxes: [const { Mailbox::new() }; MAX_MBOX],
});

pub fn init() {
    let mut t = TABLE.lock();
    for b in t.boxes.iter_mut() {
        *b = Mailbox::new();
    }
}

fn check_handle(q: usize) -> Result<(), MboxError> {
    if q >= MAX_MBOX {
        Err(MboxError::InvalidHandle)
    } else {
        Ok(())
    }
}

/// Open (or join) the mailbox identified by `key`, bumping its refcount.
pub fn mbox_open(key: usize) -> Result<usize, MboxError> {
    check_handle(key)?;
    let mut t = TABLE.lock();
    t.boxes[key].refcount += 1;
    Ok(key)
}

/// Close the caller's handle to mailbox `q`, resetting it once unreferenced.
pub fn mbox_close(q: usize) -> Result<(), MboxError> {
    check_handle(q)?;
    let mut t = TABLE.lock();
    let mbox = &mut t.boxes[q];
    if mbox.refcount == 0 {
        return Err(MboxError::NotOpen);
    }
    mbox.refcount -= 1;
    if mbox.refcount == 0 {
        *mbox = Mailbox::new();
    }
    Ok(())
}

/// Number of whole messages currently queued, and bytes of buffer free.
pub fn mbox_stat(q: usize) -> Result<(usize, usize), MboxError> {
    check_handle(q)?;
    let t = TABLE.lock();
    let mbox = &t.boxes[q];
    Ok((mbox.count, mbox.bytes_free()))
}

/// Send `body` as one message, blocking while the mailbox lacks the room.
/// The wire format is a 4-byte little-endian length header followed by the
/// message body, mirroring `ACTUAL_MSG_SIZE(n) = n + sizeof(int)`.
pub fn mbox_send(q: usize, body: &[u8]) -> Result<(), MboxError> {
    check_handle(q)?;
    if body.len() > MAX_MSG_SIZE {
        return Err(MboxError::MessageTooLarge);
    }
    let needed = body.len() + core::mem::size_of::<u32>();

    // SAFETY/design note: locking a specific table slot's embedded `Lock`
    // requires a stable address, which the fixed-size static array gives us.
    let mbox_ptr: *mut Mailbox = &mut TABLE.lock().boxes[q];
    let mbox = unsafe { &mut *mbox_ptr };

    mbox.lock.acquire();
    while mbox.bytes_free() < needed {
        mbox.space_available.wait(&mut mbox.lock);
    }
    for byte in (body.len() as u32).to_le_bytes() {
        mbox.push_byte(byte);
    }
    for &byte in body {
        mbox.push_byte(byte);
    }
    mbox.count += 1;
    mbox.data_available.signal();
    mbox.lock.release();
    Ok(())
}

/// Receive one message into `out`, blocking while the mailbox is empty.
/// Returns the message length. `out` must be at least `MAX_MSG_SIZE`.
pub fn mbox_recv(q: usize, out: &mut [u8]) -> Result<usize, MboxError> {
    check_handle(q)?;

    let mbox_ptr: *mut Mailbox = &mut TABLE.lock().boxes[q];
    let mbox = unsafe { &mut *mbox_ptr };

    mbox.lock.acquire();
    while mbox.count == 0 {
        mbox.data_available.wait(&mut mbox.lock);
    }
    let mut len_bytes = [0u8; 4];
    for b in len_bytes.iter_mut() {
        *b = mbox.pop_byte();
    }
    let len = u32::from_le_bytes(len_bytes) as usize;
    for slot in out.iter_mut().take(len) {
        *slot = mbox.pop_byte();
    }
    mbox.count -= 1;
    mbox.space_available.signal();
    mbox.lock.release();
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_close_refcounts() {
        init();
        let q = mbox_open(0).unwrap();
        assert_eq!(mbox_stat(q).unwrap().0, 0);
        mbox_close(q).unwrap();
    }

    #[test]
    fn invalid_handle_rejected() {
        assert_eq!(mbox_open(MAX_MBOX), Err(MboxError::InvalidHandle));
    }

    #[test]
    fn oversized_message_rejected() {
        init();
        let q = mbox_open(1).unwrap();
        let big = [0u8; MAX_MSG_SIZE + 1];
        assert_eq!(mbox_send(q, &big), Err(MboxError::MessageTooLarge));
        mbox_close(q).unwrap();
    }
}
