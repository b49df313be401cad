//! Console sink
//!
//! Writes each line to stderr. Opening and closing only flip the state flag;
//! the console has nothing to rotate.

use std::io::{self, Write};

use crate::error::{LogError, Result};

#[derive(Debug, Default)]
pub(crate) struct ConsoleSink {
    open: bool,
}

impl ConsoleSink {
    pub(crate) fn is_open(&self) -> bool {
        self.open
    }

    pub(crate) fn open(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    pub(crate) fn append(&mut self, text: &[u8]) -> Result<()> {
        let stderr = io::stderr();
        let mut out = stderr.lock();
        out.write_all(text)
            .and_then(|()| out.write_all(b"\n"))
            .and_then(|()| out.flush())
            .map_err(|e| LogError::io("write to stderr", e))
    }

    pub(crate) fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }
}
