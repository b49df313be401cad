//! Message formatters
//!
//! A formatter renders the caller's message into a [`MessageBuffer`] and then
//! fills the reserved prefix with a timestamp, optionally followed by the
//! process and OS thread ids.

use std::fmt;
use std::io::Write;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::buffer::MessageBuffer;
use crate::error::{LogError, Result};

/// strftime pattern for the line timestamp
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Width of a rendered timestamp
pub const TIMESTAMP_WIDTH: usize = 19;

/// Prefix width of [`Formatter::Plain`]: timestamp plus one space
pub const PLAIN_PREFIX_WIDTH: usize = TIMESTAMP_WIDTH + 1;

/// Prefix width of [`Formatter::Identified`]: timestamp, ` <PPPPP TTTTT>` and one space
pub const IDENTIFIED_PREFIX_WIDTH: usize = 34;

/// Process and thread ids are shown with this many digits
const ID_DIGITS: u64 = 100_000;

/// Line prefix layout, chosen per destination by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Formatter {
    /// `YYYY-MM-DD HH:MM:SS message`
    Plain,
    /// `YYYY-MM-DD HH:MM:SS <  pid   tid> message`
    Identified,
}

impl Formatter {
    /// Look up a formatter by name
    pub fn from_name(name: &str) -> Option<Formatter> {
        match name {
            "plain" => Some(Formatter::Plain),
            "identified" => Some(Formatter::Identified),
            _ => None,
        }
    }

    /// Get the name this formatter is selected by
    pub fn name(&self) -> &'static str {
        match self {
            Formatter::Plain => "plain",
            Formatter::Identified => "identified",
        }
    }

    /// Number of bytes reserved ahead of the message
    pub fn prefix_width(&self) -> usize {
        match self {
            Formatter::Plain => PLAIN_PREFIX_WIDTH,
            Formatter::Identified => IDENTIFIED_PREFIX_WIDTH,
        }
    }

    /// Render `args` stamped with the current local time
    pub fn render<'b>(
        &self,
        buffer: &'b mut MessageBuffer,
        args: fmt::Arguments<'_>,
    ) -> Result<&'b [u8]> {
        self.render_at(buffer, Local::now(), args)
    }

    /// Render `args` stamped with `now`
    pub fn render_at<'b>(
        &self,
        buffer: &'b mut MessageBuffer,
        now: DateTime<Local>,
        args: fmt::Arguments<'_>,
    ) -> Result<&'b [u8]> {
        let width = self.prefix_width();
        buffer.format(width, args)?;

        let prefix = buffer
            .prefix_mut(width)
            .ok_or(LogError::BufferUnavailable)?;

        let mut slot = &mut prefix[..TIMESTAMP_WIDTH];
        write!(slot, "{}", now.format(TIMESTAMP_FORMAT))
            .map_err(|e| LogError::io("render timestamp", e))?;

        if *self == Formatter::Identified {
            let mut slot = &mut prefix[TIMESTAMP_WIDTH..width - 1];
            write!(
                slot,
                " <{:>5} {:>5}>",
                u64::from(std::process::id()) % ID_DIGITS,
                os_thread_id() % ID_DIGITS
            )
            .map_err(|e| LogError::io("render thread ids", e))?;
        }
        prefix[width - 1] = b' ';

        Ok(buffer.as_bytes())
    }
}

impl fmt::Display for Formatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kernel id of the calling thread
#[cfg(target_os = "linux")]
pub fn os_thread_id() -> u64 {
    thread_local! {
        // SAFETY: gettid takes no arguments and cannot fail
        static TID: u64 = unsafe { libc::syscall(libc::SYS_gettid) } as u64;
    }
    TID.with(|tid| *tid)
}

/// Sequential id of the calling thread, assigned on first use
#[cfg(not(target_os = "linux"))]
pub fn os_thread_id() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};

    static NEXT: AtomicU64 = AtomicU64::new(1);
    thread_local! {
        static TID: u64 = NEXT.fetch_add(1, Ordering::Relaxed);
    }
    TID.with(|tid| *tid)
}
