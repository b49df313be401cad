//! Logger registry
//!
//! The registry is built once at startup, then shared (usually behind an
//! `Arc`) with whatever needs lookup by name, including the rotation ticker.
//! It also bootstraps the default logger, of which a process may create at
//! most one.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::destination::{DestinationKind, DestinationSpec};
use crate::error::{LogError, Result};
use crate::format::Formatter;
use crate::level::Level;
use crate::logger::Logger;

/// Name of the default logger
pub const DEFAULT_LOGGER_NAME: &str = "noname";

/// Name of the default logger's only destination
pub const DEFAULT_DESTINATION_NAME: &str = "default-hour-file";

/// Directory, next to the executable, holding the default log file
pub const DEFAULT_LOG_DIR: &str = "logs";

static DEFAULT_CLAIMED: AtomicBool = AtomicBool::new(false);

/// Loggers known to the process, looked up by name
#[derive(Debug, Default)]
pub struct Registry {
    loggers: Vec<Arc<Logger>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a logger; names must be unique
    pub fn register(&mut self, logger: Logger) -> Result<Arc<Logger>> {
        if self.get(logger.name()).is_some() {
            return Err(LogError::DuplicateLogger(logger.name().to_string()));
        }
        let logger = Arc::new(logger);
        self.loggers.push(Arc::clone(&logger));
        Ok(logger)
    }

    /// Get a logger by name
    pub fn get(&self, name: &str) -> Option<Arc<Logger>> {
        if name.is_empty() {
            return None;
        }
        self.loggers.iter().find(|l| l.name() == name).cloned()
    }

    /// Get the default logger, creating and registering it on first use
    pub fn default_logger(&mut self) -> Result<Arc<Logger>> {
        if let Some(logger) = self.get(DEFAULT_LOGGER_NAME) {
            return Ok(logger);
        }
        let logger = create_default_logger()?;
        self.register(logger)
    }

    /// Registered loggers, in registration order
    pub fn loggers(&self) -> &[Arc<Logger>] {
        &self.loggers
    }

    pub fn len(&self) -> usize {
        self.loggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }

    /// One rotation pass over every destination of every logger
    ///
    /// Returns the number of destinations whose check failed.
    pub fn rotate_all(&self) -> usize {
        self.loggers.iter().map(|l| l.rotate_all()).sum()
    }

    /// Close every destination of every logger; returns the failure count
    pub fn close_all(&self) -> usize {
        self.loggers.iter().map(|l| l.close_all()).sum()
    }
}

/// Path of the default log file for an executable at `exe`
///
/// `/opt/app/bin/server` maps to `/opt/app/bin/logs/server.log`.
pub fn default_log_path_for(exe: &Path) -> Result<PathBuf> {
    let dir = exe.parent().ok_or(LogError::ExecutablePath)?;
    let name = exe.file_name().ok_or(LogError::ExecutablePath)?;

    let mut file_name = name.to_os_string();
    file_name.push(".log");
    Ok(dir.join(DEFAULT_LOG_DIR).join(file_name))
}

/// Path of the default log file for the running executable
pub fn default_log_path() -> Result<PathBuf> {
    let exe = std::env::current_exe().map_err(|_| LogError::ExecutablePath)?;
    default_log_path_for(&exe)
}

/// Create the default logger, logging to [`default_log_path`]
pub fn create_default_logger() -> Result<Logger> {
    create_default_logger_at(default_log_path()?)
}

/// Create the default logger writing to `path`
///
/// Succeeds at most once per process; later calls fail with
/// [`LogError::DefaultLoggerExists`]. A failed attempt leaves no trace and
/// does not use up the single creation.
pub fn create_default_logger_at(path: PathBuf) -> Result<Logger> {
    if DEFAULT_CLAIMED
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return Err(LogError::DefaultLoggerExists);
    }

    build_default_logger(path).map_err(|e| {
        DEFAULT_CLAIMED.store(false, Ordering::Release);
        e
    })
}

fn build_default_logger(path: PathBuf) -> Result<Logger> {
    if let Some(dir) = path.parent() {
        create_log_dir(dir).map_err(|e| LogError::io(format!("create {}", dir.display()), e))?;
    }

    let mut logger = Logger::new(DEFAULT_LOGGER_NAME, Level::Debug)?;
    logger.attach(
        DestinationSpec::new(DEFAULT_DESTINATION_NAME, DestinationKind::HourFile { path })
            .formatter(Formatter::Identified)
            .level(Level::Debug),
    )?;

    tracing::debug!(logger = DEFAULT_LOGGER_NAME, "default logger created");
    Ok(logger)
}

fn create_log_dir(dir: &Path) -> std::io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(dir)
}
