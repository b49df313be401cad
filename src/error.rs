//! Error types for the logging engine
//!
//! Every failure here is local to one call. Nothing in the engine panics or
//! aborts the caller; errors come back as values and are mirrored to the
//! diagnostic channel where no caller is around to see them.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by loggers, destinations and the registry
#[derive(Debug, Error)]
pub enum LogError {
    #[error("invalid level: {0}")]
    InvalidLevel(String),

    #[error("{0} name cannot be empty")]
    EmptyName(&'static str),

    #[error("destination file path is empty")]
    EmptyPath,

    #[error("destination '{0}' needs a rotation span greater than zero")]
    InvalidSpan(String),

    #[error("logger '{0}' is already registered")]
    DuplicateLogger(String),

    #[error("the default logger has already been created")]
    DefaultLoggerExists,

    #[error("message buffer is unavailable on this thread")]
    BufferUnavailable,

    #[error("message buffer could not grow to {0} bytes")]
    BufferAlloc(usize),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to rename {} to {}: {source}", from.display(), to.display())]
    Rotate {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot derive a log path from the running executable")]
    ExecutablePath,

    #[error("configuration error: {0}")]
    Config(String),
}

impl LogError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        LogError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, LogError>;
