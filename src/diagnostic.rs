//! Self-diagnostic channel
//!
//! Failures of the engine itself (a file that will not open, a rename that
//! fails during rotation) are recorded here as timestamped lines in a side
//! file, separate from any user destination. The file is opened and closed
//! per record so it stays usable when everything else is broken.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::Local;

use crate::format::TIMESTAMP_FORMAT;

/// File name of the default diagnostic log inside the temp directory
pub const DEFAULT_DIAGNOSTIC_FILE: &str = "rotalog.err";

static CHANNEL: OnceLock<DiagnosticLog> = OnceLock::new();

/// Append-only side file for engine failures
#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    path: PathBuf,
}

impl DiagnosticLog {
    /// Create a diagnostic log writing to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the path of the side file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped line
    ///
    /// Falls back to stderr when the side file cannot be opened.
    pub fn record(&self, msg: &str) {
        let stamp = Local::now().format(TIMESTAMP_FORMAT);
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| {
                writeln!(file, "{} {}", stamp, msg)?;
                file.flush()
            });

        if let Err(e) = written {
            eprintln!(
                "rotalog diagnostic '{}' unavailable ({}): {}",
                self.path.display(),
                e,
                msg
            );
        }
    }
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join(DEFAULT_DIAGNOSTIC_FILE))
    }
}

/// Point the process-wide channel at `path`
///
/// Only the first call wins; returns `false` if the channel was already
/// configured or already used.
pub fn set_path(path: impl Into<PathBuf>) -> bool {
    CHANNEL.set(DiagnosticLog::new(path)).is_ok()
}

/// Get the process-wide channel, initializing it to the default path
pub fn channel() -> &'static DiagnosticLog {
    CHANNEL.get_or_init(DiagnosticLog::default)
}

/// Report an engine failure to the process-wide channel
pub fn report(msg: &str) {
    tracing::warn!(diagnostic = %channel().path().display(), "{}", msg);
    channel().record(msg);
}
