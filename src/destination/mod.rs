//! Output destinations
//!
//! A destination is one sink (console or rotating file) behind its own
//! mutex. Open, append, close and rotation checks on one destination are
//! serialized by that mutex; different destinations never contend.
//!
//! State machine: Closed -> Open (explicit `open` or lazily on append) ->
//! Closed (`close`, a rotation, or a failed write) -> Open again.

mod console;
mod rotating_file;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::diagnostic;
use crate::error::{LogError, Result};
use crate::format::Formatter;
use crate::level::{check_threshold, Level};

use console::ConsoleSink;
use rotating_file::RotatingFile;

pub use rotating_file::{rotated_path, Rotation, HOURLY_SUFFIX_FORMAT, INTERVAL_SUFFIX_FORMAT};

/// Kind of sink behind a destination, with its kind-specific options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DestinationKind {
    /// Lines go to stderr
    Console,
    /// File renamed after it has been open for `span_secs` seconds
    TimeFile { path: PathBuf, span_secs: u64 },
    /// File renamed when the wall-clock hour changes
    HourFile { path: PathBuf },
}

impl DestinationKind {
    /// Get the display name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationKind::Console => "console",
            DestinationKind::TimeFile { .. } => "time_file",
            DestinationKind::HourFile { .. } => "hour_file",
        }
    }
}

/// Everything needed to attach a destination to a logger
#[derive(Debug, Clone)]
pub struct DestinationSpec {
    pub name: String,
    pub kind: DestinationKind,
    /// Destinations without a formatter are skipped when logging
    pub formatter: Option<Formatter>,
    /// Threshold override; the logger's threshold is used when absent
    pub level: Option<Level>,
}

impl DestinationSpec {
    /// Create a spec using the plain formatter and the logger's threshold
    pub fn new(name: impl Into<String>, kind: DestinationKind) -> Self {
        Self {
            name: name.into(),
            kind,
            formatter: Some(Formatter::Plain),
            level: None,
        }
    }

    /// Use `formatter` for this destination
    pub fn formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Override the threshold inherited from the logger
    pub fn level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }
}

#[derive(Debug)]
enum Sink {
    Console(ConsoleSink),
    File(RotatingFile),
}

impl Sink {
    fn is_open(&self) -> bool {
        match self {
            Sink::Console(sink) => sink.is_open(),
            Sink::File(sink) => sink.is_open(),
        }
    }

    fn open(&mut self, now: DateTime<Local>) -> Result<()> {
        match self {
            Sink::Console(sink) => sink.open(),
            Sink::File(sink) => sink.open(now),
        }
    }

    fn append(&mut self, text: &[u8]) -> Result<()> {
        match self {
            Sink::Console(sink) => sink.append(text),
            Sink::File(sink) => sink.append(text),
        }
    }

    fn close(&mut self) -> Result<()> {
        match self {
            Sink::Console(sink) => sink.close(),
            Sink::File(sink) => sink.close(),
        }
    }

    fn rotate_check(&mut self, now: DateTime<Local>) -> Result<bool> {
        match self {
            Sink::Console(_) => Ok(false),
            Sink::File(sink) => sink.rotate_check(now),
        }
    }
}

/// A named, severity-gated output sink
#[derive(Debug)]
pub struct Destination {
    name: String,
    kind: &'static str,
    threshold: AtomicU8,
    formatter: Option<Formatter>,
    sink: Mutex<Sink>,
}

impl Destination {
    /// Create a closed destination
    ///
    /// `threshold` must be within `ERROR..=DEBUG`, and a time file needs a
    /// span of at least one second.
    pub fn new(
        name: impl Into<String>,
        kind: DestinationKind,
        formatter: Option<Formatter>,
        threshold: Level,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(LogError::EmptyName("destination"));
        }
        let threshold = check_threshold(threshold)?;
        let kind_name = kind.as_str();

        let sink = match kind {
            DestinationKind::Console => Sink::Console(ConsoleSink::default()),
            DestinationKind::TimeFile { path, span_secs } => {
                let span_secs = i64::try_from(span_secs)
                    .ok()
                    .filter(|span| *span > 0)
                    .ok_or_else(|| LogError::InvalidSpan(name.clone()))?;
                Sink::File(RotatingFile::new(path, Rotation::Interval { span_secs }))
            }
            DestinationKind::HourFile { path } => {
                Sink::File(RotatingFile::new(path, Rotation::Hourly))
            }
        };

        Ok(Self {
            name,
            kind: kind_name,
            threshold: AtomicU8::new(threshold as u8),
            formatter,
            sink: Mutex::new(sink),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind name: `console`, `time_file` or `hour_file`
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn formatter(&self) -> Option<Formatter> {
        self.formatter
    }

    pub fn threshold(&self) -> Level {
        Level::from_u8(self.threshold.load(Ordering::Acquire))
    }

    /// Change this destination's threshold independently of its logger
    pub fn set_threshold(&self, level: Level) -> Result<()> {
        let level = check_threshold(level)?;
        self.threshold.store(level as u8, Ordering::Release);
        Ok(())
    }

    /// Whether a message at `level` would be written
    pub fn permits(&self, level: Level) -> bool {
        self.threshold().permits(level)
    }

    pub fn is_open(&self) -> bool {
        self.sink().is_open()
    }

    /// File path for file destinations
    pub fn path(&self) -> Option<PathBuf> {
        match &*self.sink() {
            Sink::File(file) => Some(file.path().to_path_buf()),
            Sink::Console(_) => None,
        }
    }

    /// Rotation policy for file destinations
    pub fn rotation(&self) -> Option<Rotation> {
        match &*self.sink() {
            Sink::File(file) => Some(file.rotation()),
            Sink::Console(_) => None,
        }
    }

    /// When the current file was opened, if one is open
    pub fn opened_at(&self) -> Option<DateTime<Local>> {
        match &*self.sink() {
            Sink::File(file) => file.opened_at(),
            Sink::Console(_) => None,
        }
    }

    /// Open the destination, re-opening it if it is already open
    pub fn open(&self) -> Result<()> {
        let mut sink = self.sink();
        self.open_locked(&mut sink)
    }

    /// Write `text` as one line if `level` passes the threshold
    ///
    /// Opens the destination first if it is closed. Every line is flushed
    /// before the lock is released.
    pub fn append(&self, level: Level, text: &[u8]) -> Result<()> {
        if !self.permits(level) {
            return Ok(());
        }

        let mut sink = self.sink();
        if !sink.is_open() {
            self.open_locked(&mut sink)?;
        }

        let written = sink.append(text);
        self.reported("append", written)
    }

    /// Release the underlying handle; a no-op when already closed
    pub fn close(&self) -> Result<()> {
        let mut sink = self.sink();
        if !sink.is_open() {
            return Ok(());
        }
        tracing::debug!(destination = %self.name, "closing");
        let closed = sink.close();
        self.reported("close", closed)
    }

    /// Rotate the file if it is due now; see [`Destination::rotate_check_at`]
    pub fn rotate_check(&self) -> Result<bool> {
        self.rotate_check_at(Local::now())
    }

    /// Rotate the file if it is due at `now`
    ///
    /// Does nothing while closed. After a rotation, or a failed rename, the
    /// destination stays closed until the next append re-opens it. Returns
    /// whether a rotation happened.
    pub fn rotate_check_at(&self, now: DateTime<Local>) -> Result<bool> {
        let mut sink = self.sink();
        let checked = sink.rotate_check(now);
        let rotated = self.reported("rotation", checked)?;
        if rotated {
            tracing::debug!(destination = %self.name, "rotated");
        }
        Ok(rotated)
    }

    fn open_locked(&self, sink: &mut Sink) -> Result<()> {
        let opened = sink.open(Local::now());
        self.reported("open", opened)?;
        tracing::debug!(destination = %self.name, kind = self.kind, "opened");
        Ok(())
    }

    /// Pass `result` through, recording a failure of `op` to the diagnostic channel
    fn reported<T>(&self, op: &str, result: Result<T>) -> Result<T> {
        result.map_err(|e| {
            diagnostic::report(&format!("destination '{}' {} failed: {}", self.name, op, e));
            e
        })
    }

    fn sink(&self) -> MutexGuard<'_, Sink> {
        // Sink state is consistent between statements, so a poisoned lock is safe to reuse
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Whether `path` names a rotated sibling of `base`
pub fn is_rotated_sibling(base: &Path, path: &Path) -> bool {
    let (Some(base_name), Some(name)) = (base.file_name(), path.file_name()) else {
        return false;
    };
    let base_name = base_name.to_string_lossy();
    let name = name.to_string_lossy();
    base.parent() == path.parent()
        && name.len() > base_name.len() + 1
        && name.starts_with(base_name.as_ref())
        && name.as_bytes()[base_name.len()] == b'.'
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn time_file(dir: &TempDir, span_secs: u64) -> Destination {
        Destination::new(
            "main",
            DestinationKind::TimeFile {
                path: dir.path().join("app.log"),
                span_secs,
            },
            Some(Formatter::Plain),
            Level::Debug,
        )
        .unwrap()
    }

    fn hour_file(dir: &TempDir) -> Destination {
        Destination::new(
            "hourly",
            DestinationKind::HourFile {
                path: dir.path().join("app.log"),
            },
            Some(Formatter::Identified),
            Level::Debug,
        )
        .unwrap()
    }

    #[test]
    fn test_new_validates_input() {
        let dir = TempDir::new().unwrap();
        let kind = DestinationKind::HourFile {
            path: dir.path().join("x.log"),
        };

        assert!(matches!(
            Destination::new("", kind.clone(), None, Level::Debug),
            Err(LogError::EmptyName(_))
        ));
        assert!(matches!(
            Destination::new("d", kind, None, Level::Data),
            Err(LogError::InvalidLevel(_))
        ));
        assert!(matches!(
            Destination::new(
                "d",
                DestinationKind::TimeFile {
                    path: dir.path().join("x.log"),
                    span_secs: 0
                },
                None,
                Level::Info
            ),
            Err(LogError::InvalidSpan(_))
        ));
    }

    #[test]
    fn test_append_opens_lazily_and_writes_lines() {
        let dir = TempDir::new().unwrap();
        let dest = time_file(&dir, 3600);
        assert!(!dest.is_open());

        dest.append(Level::Error, b"first").unwrap();
        assert!(dest.is_open());
        dest.append(Level::Info, b"second").unwrap();

        let contents = std::fs::read_to_string(dir.path().join("app.log")).unwrap();
        assert_eq!(contents, "first\nsecond\n");
    }

    #[test]
    fn test_append_below_threshold_is_noop() {
        let dir = TempDir::new().unwrap();
        let dest = time_file(&dir, 3600);
        dest.set_threshold(Level::Warn).unwrap();

        dest.append(Level::Info, b"chatty").unwrap();
        assert!(!dest.is_open());
        assert!(!dir.path().join("app.log").exists());
    }

    #[test]
    fn test_open_failure_leaves_destination_closed() {
        let dir = TempDir::new().unwrap();
        let dest = Destination::new(
            "broken",
            DestinationKind::HourFile {
                path: dir.path().join("no-such-dir").join("app.log"),
            },
            Some(Formatter::Plain),
            Level::Debug,
        )
        .unwrap();

        assert!(dest.append(Level::Error, b"lost").is_err());
        assert!(!dest.is_open());
        assert!(dest.open().is_err());
    }

    #[test]
    fn test_open_with_empty_path_fails() {
        let dest = Destination::new(
            "empty",
            DestinationKind::HourFile { path: PathBuf::new() },
            None,
            Level::Debug,
        )
        .unwrap();
        assert!(matches!(dest.open(), Err(LogError::EmptyPath)));
        assert!(!dest.is_open());
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let dest = time_file(&dir, 60);
        dest.close().unwrap();

        dest.open().unwrap();
        assert!(dest.is_open());
        assert!(dest.opened_at().is_some());
        dest.close().unwrap();
        assert!(!dest.is_open());
        assert!(dest.opened_at().is_none());
        dest.close().unwrap();
    }

    #[test]
    fn test_reopen_while_open_refreshes_timestamp() {
        let dir = TempDir::new().unwrap();
        let dest = time_file(&dir, 60);
        dest.open().unwrap();
        let first = dest.opened_at().unwrap();
        dest.open().unwrap();
        assert!(dest.is_open());
        assert!(dest.opened_at().unwrap() >= first);
    }

    #[test]
    fn test_rotate_check_on_closed_is_noop() {
        let dir = TempDir::new().unwrap();
        let dest = time_file(&dir, 1);
        let later = Local::now() + Duration::hours(5);
        assert!(!dest.rotate_check_at(later).unwrap());
    }

    #[test]
    fn test_time_file_rotation() {
        let dir = TempDir::new().unwrap();
        let dest = time_file(&dir, 30);
        dest.append(Level::Error, b"before").unwrap();
        let t0 = dest.opened_at().unwrap();

        // Not yet due
        assert!(!dest.rotate_check_at(t0 + Duration::seconds(29)).unwrap());
        assert!(dest.is_open());

        // Due: renamed to <path>.<t0> and left closed
        assert!(dest.rotate_check_at(t0 + Duration::seconds(30)).unwrap());
        assert!(!dest.is_open());

        let log_path = dir.path().join("app.log");
        let rotated = rotated_path(&log_path, Rotation::Interval { span_secs: 30 }, t0);
        assert!(!log_path.exists());
        assert_eq!(std::fs::read_to_string(&rotated).unwrap(), "before\n");
        assert!(is_rotated_sibling(&log_path, &rotated));

        // The next append starts a fresh file at the original path
        dest.append(Level::Error, b"after").unwrap();
        assert_eq!(std::fs::read_to_string(&log_path).unwrap(), "after\n");
    }

    #[test]
    fn test_hour_file_rotates_once_per_hour_change() {
        let dir = TempDir::new().unwrap();
        let dest = hour_file(&dir);
        dest.append(Level::Info, b"line").unwrap();
        let t0 = dest.opened_at().unwrap();

        assert!(!dest.rotate_check_at(t0).unwrap());

        let next_hour = t0 + Duration::hours(1);
        assert!(dest.rotate_check_at(next_hour).unwrap());
        assert!(!dest.rotate_check_at(next_hour).unwrap());

        let log_path = dir.path().join("app.log");
        let rotated = rotated_path(&log_path, Rotation::Hourly, t0);
        assert!(rotated.exists());
        assert!(rotated
            .to_string_lossy()
            .ends_with(&t0.format(HOURLY_SUFFIX_FORMAT).to_string()));
    }

    #[test]
    fn test_rename_failure_leaves_destination_closed() {
        let dir = TempDir::new().unwrap();
        let dest = time_file(&dir, 1);
        dest.append(Level::Error, b"doomed").unwrap();
        let t0 = dest.opened_at().unwrap();

        // Pull the file out from under the destination so the rename fails
        std::fs::remove_file(dir.path().join("app.log")).unwrap();

        let result = dest.rotate_check_at(t0 + Duration::seconds(5));
        assert!(matches!(result, Err(LogError::Rotate { .. })));
        assert!(!dest.is_open());

        // Recovers on the next append
        dest.append(Level::Error, b"again").unwrap();
        assert!(dest.is_open());
    }

    #[test]
    fn test_console_has_no_rotation() {
        let dest =
            Destination::new("console", DestinationKind::Console, Some(Formatter::Plain), Level::Info)
                .unwrap();
        dest.open().unwrap();
        assert!(dest.is_open());
        assert!(dest.path().is_none());
        assert!(!dest.rotate_check_at(Local::now() + Duration::days(2)).unwrap());
        dest.close().unwrap();
        assert!(!dest.is_open());
    }

    #[test]
    fn test_concurrent_appends_produce_whole_lines() {
        let dir = TempDir::new().unwrap();
        let dest = Arc::new(time_file(&dir, 3600));
        let threads = 8;
        let per_thread = 200;

        std::thread::scope(|scope| {
            for t in 0..threads {
                let dest = Arc::clone(&dest);
                scope.spawn(move || {
                    for i in 0..per_thread {
                        let line = format!("thread-{t:02} line-{i:04} {}", "p".repeat(300));
                        dest.append(Level::Info, line.as_bytes()).unwrap();
                    }
                });
            }
        });

        let contents = std::fs::read_to_string(dir.path().join("app.log")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), threads * per_thread);
        for line in lines {
            assert!(line.starts_with("thread-"));
            assert!(line.ends_with(&"p".repeat(300)));
            assert_eq!(line.len(), "thread-00 line-0000 ".len() + 300);
        }
    }

    #[test]
    fn test_failures_reach_diagnostic_channel() {
        let dest = Destination::new(
            "diag-close-check",
            DestinationKind::Console,
            Some(Formatter::Plain),
            Level::Info,
        )
        .unwrap();

        let result: Result<()> = dest.reported("close", Err(LogError::EmptyPath));
        assert!(matches!(result, Err(LogError::EmptyPath)));
        assert_eq!(dest.reported("close", Ok(7)).unwrap(), 7);

        let recorded = std::fs::read_to_string(diagnostic::channel().path()).unwrap_or_default();
        assert!(recorded.contains("destination 'diag-close-check' close failed"));
    }

    #[test]
    fn test_is_rotated_sibling() {
        let base = Path::new("/logs/app.log");
        assert!(is_rotated_sibling(base, Path::new("/logs/app.log.2024-01-01-10")));
        assert!(!is_rotated_sibling(base, Path::new("/logs/app.log")));
        assert!(!is_rotated_sibling(base, Path::new("/logs/app.logx")));
        assert!(!is_rotated_sibling(base, Path::new("/other/app.log.2024-01-01-10")));
    }
}
