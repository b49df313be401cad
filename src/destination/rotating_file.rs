//! Rotating file sink
//!
//! Appends lines to a file opened in append mode and, when a rotation check
//! finds the file due, closes it and renames it to
//! `<path>.<open timestamp>`. The sink is left closed after a rotation; the
//! next append opens a fresh file at the original path.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate, Timelike};

use crate::error::{LogError, Result};

/// Suffix pattern for files rotated on an interval
pub const INTERVAL_SUFFIX_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Suffix pattern for files rotated on the hour
pub const HOURLY_SUFFIX_FORMAT: &str = "%Y-%m-%d-%H";

/// When a file becomes due for rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// After the file has been open for `span_secs` seconds
    Interval { span_secs: i64 },
    /// When the wall-clock hour differs from the hour the file was opened in
    Hourly,
}

impl Rotation {
    fn suffix_format(&self) -> &'static str {
        match self {
            Rotation::Interval { .. } => INTERVAL_SUFFIX_FORMAT,
            Rotation::Hourly => HOURLY_SUFFIX_FORMAT,
        }
    }

    fn is_due(&self, opened_at: DateTime<Local>, now: DateTime<Local>) -> bool {
        match self {
            Rotation::Interval { span_secs } => now.timestamp() - opened_at.timestamp() >= *span_secs,
            Rotation::Hourly => hour_of(now) != hour_of(opened_at),
        }
    }
}

fn hour_of(at: DateTime<Local>) -> (NaiveDate, u32) {
    (at.date_naive(), at.hour())
}

/// Path a file opened at `opened_at` is renamed to
pub fn rotated_path(path: &Path, rotation: Rotation, opened_at: DateTime<Local>) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(opened_at.format(rotation.suffix_format()).to_string());
    PathBuf::from(name)
}

#[derive(Debug)]
struct OpenFile {
    file: File,
    opened_at: DateTime<Local>,
}

#[derive(Debug)]
pub(crate) struct RotatingFile {
    path: PathBuf,
    rotation: Rotation,
    current: Option<OpenFile>,
}

impl RotatingFile {
    pub(crate) fn new(path: PathBuf, rotation: Rotation) -> Self {
        Self {
            path,
            rotation,
            current: None,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub(crate) fn is_open(&self) -> bool {
        self.current.is_some()
    }

    pub(crate) fn opened_at(&self) -> Option<DateTime<Local>> {
        self.current.as_ref().map(|open| open.opened_at)
    }

    /// Open (or re-open) the file, recording `now` as its open time
    pub(crate) fn open(&mut self, now: DateTime<Local>) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(LogError::EmptyPath);
        }

        // Re-opening drops the previous handle first
        self.current = None;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| LogError::io(format!("open {}", self.path.display()), e))?;

        self.current = Some(OpenFile {
            file,
            opened_at: now,
        });
        Ok(())
    }

    /// Write one line and flush; a failed write closes the file
    pub(crate) fn append(&mut self, text: &[u8]) -> Result<()> {
        let Some(open) = self.current.as_mut() else {
            return Err(LogError::io(
                format!("append {}", self.path.display()),
                std::io::Error::new(std::io::ErrorKind::NotConnected, "file is closed"),
            ));
        };

        let written = open
            .file
            .write_all(text)
            .and_then(|()| open.file.write_all(b"\n"))
            .and_then(|()| open.file.flush());

        if let Err(e) = written {
            self.current = None;
            return Err(LogError::io(format!("write {}", self.path.display()), e));
        }
        Ok(())
    }

    pub(crate) fn close(&mut self) -> Result<()> {
        match self.current.take() {
            Some(mut open) => open
                .file
                .flush()
                .map_err(|e| LogError::io(format!("close {}", self.path.display()), e)),
            None => Ok(()),
        }
    }

    /// Rotate if the open file is due at `now`; returns whether it rotated
    pub(crate) fn rotate_check(&mut self, now: DateTime<Local>) -> Result<bool> {
        let Some(opened_at) = self.opened_at() else {
            return Ok(false);
        };
        if !self.rotation.is_due(opened_at, now) {
            return Ok(false);
        }

        self.close()?;

        let target = rotated_path(&self.path, self.rotation, opened_at);
        fs::rename(&self.path, &target).map_err(|source| LogError::Rotate {
            from: self.path.clone(),
            to: target.clone(),
            source,
        })?;
        Ok(true)
    }
}
