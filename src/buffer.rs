//! Growable per-thread message buffer
//!
//! A formatting pass writes the caller's message after a reserved prefix
//! region. When the message does not fit, the buffer grows to the exact size
//! needed (plus slack) and formatting is replayed from scratch. Messages over
//! [`MSG_MAX`] bytes are replaced by [`TOO_LONG_MARKER`].
//!
//! Each (logger, thread) pair owns one buffer, kept in thread-local storage
//! and dropped when the thread exits. Buffers are borrowed one at a time, so
//! a message argument may itself log to another logger.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::diagnostic;
use crate::error::{LogError, Result};

/// Hard ceiling on the length of one formatted message (bytes)
pub const MSG_MAX: usize = 512 * 1024;

/// Capacity allocated on first use
pub const INITIAL_CAPACITY: usize = 1024;

/// Extra room added on every growth
pub const GROWTH_SLACK: usize = 64;

/// Written in place of messages longer than [`MSG_MAX`]
pub const TOO_LONG_MARKER: &str = "LOG TOO LONG";

thread_local! {
    static BUFFERS: RefCell<HashMap<u64, Rc<RefCell<MessageBuffer>>>> =
        RefCell::new(HashMap::new());
}

/// Reusable scratch buffer for one formatting pass at a time
#[derive(Debug, Default)]
pub struct MessageBuffer {
    bytes: Vec<u8>,
    capacity: usize,
}

impl MessageBuffer {
    /// Create an empty buffer; storage is allocated on first format
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer with `capacity` bytes already reserved
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Current logical capacity in bytes (prefix included)
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Output of the last successful format, prefix included
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Mutable view of the reserved prefix region
    ///
    /// Returns `None` if the last format did not reserve `width` bytes.
    pub fn prefix_mut(&mut self, width: usize) -> Option<&mut [u8]> {
        self.bytes.get_mut(..width)
    }

    /// Format `args` into the buffer after `reserved` prefix bytes
    ///
    /// The prefix region is filled with spaces for the caller to overwrite.
    /// On allocation failure the buffer is left empty with zero capacity.
    pub fn format(&mut self, reserved: usize, args: fmt::Arguments<'_>) -> Result<()> {
        if self.capacity == 0 {
            self.grow(INITIAL_CAPACITY.max(reserved + GROWTH_SLACK))?;
        }

        loop {
            self.bytes.clear();
            self.bytes.resize(reserved, b' ');

            let mut writer = BoundedWriter {
                bytes: &mut self.bytes,
                limit: self.capacity,
                needed: reserved,
                overflowed: false,
            };
            // BoundedWriter never fails; an error here comes from a Display impl
            // and leaves whatever it managed to write.
            let _ = fmt::write(&mut writer, args);
            let needed = writer.needed;
            let message_len = needed - reserved;

            if message_len > MSG_MAX {
                self.bytes.truncate(reserved);
                self.bytes.extend_from_slice(TOO_LONG_MARKER.as_bytes());
                return Ok(());
            }

            if needed <= self.capacity {
                return Ok(());
            }

            self.grow(message_len + reserved + GROWTH_SLACK)?;
        }
    }

    fn grow(&mut self, capacity: usize) -> Result<()> {
        self.bytes.clear();
        if self.bytes.try_reserve_exact(capacity).is_err() {
            self.bytes = Vec::new();
            self.capacity = 0;
            diagnostic::report(&format!("message buffer failed to grow to {} bytes", capacity));
            return Err(LogError::BufferAlloc(capacity));
        }
        self.capacity = capacity;
        Ok(())
    }
}

/// Copies output while it fits under `limit`, and counts the total regardless
struct BoundedWriter<'a> {
    bytes: &'a mut Vec<u8>,
    limit: usize,
    needed: usize,
    overflowed: bool,
}

impl fmt::Write for BoundedWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.needed = self.needed.saturating_add(s.len());
        if !self.overflowed && self.needed <= self.limit {
            self.bytes.extend_from_slice(s.as_bytes());
        } else {
            self.overflowed = true;
        }
        Ok(())
    }
}

/// Run `f` with the calling thread's buffer for logger `owner`
///
/// Only `owner`'s buffer is borrowed while `f` runs. Fails with
/// [`LogError::BufferUnavailable`] during thread teardown or when the same
/// owner's buffer is re-entered from inside `f`.
pub(crate) fn with_thread_buffer<R>(
    owner: u64,
    f: impl FnOnce(&mut MessageBuffer) -> Result<R>,
) -> Result<R> {
    let slot = BUFFERS.try_with(|cell| {
        cell.try_borrow_mut().map(|mut buffers| {
            let slot = buffers.entry(owner).or_default();
            Rc::clone(slot)
        })
    });

    let slot = match slot {
        Ok(Ok(slot)) => slot,
        Ok(Err(_)) => {
            diagnostic::report(&format!("buffer table of logger {} is busy", owner));
            return Err(LogError::BufferUnavailable);
        }
        Err(_) => {
            diagnostic::channel().record("message buffer requested during thread teardown");
            return Err(LogError::BufferUnavailable);
        }
    };

    let Ok(mut buffer) = slot.try_borrow_mut() else {
        diagnostic::report(&format!(
            "message buffer of logger {} re-entered on the same thread",
            owner
        ));
        return Err(LogError::BufferUnavailable);
    };
    f(&mut buffer)
}
