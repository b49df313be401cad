//! Loggers
//!
//! A logger is a named severity gate in front of an ordered list of
//! destinations. Each log call renders the message once per destination,
//! into the calling thread's buffer, with that destination's formatter.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::buffer;
use crate::destination::{Destination, DestinationSpec};
use crate::error::{LogError, Result};
use crate::format::Formatter;
use crate::level::{check_threshold, Level};

static NEXT_LOGGER_ID: AtomicU64 = AtomicU64::new(1);

/// Named fan-out point owning its destinations
#[derive(Debug)]
pub struct Logger {
    id: u64,
    name: String,
    threshold: AtomicU8,
    destinations: Vec<Destination>,
}

impl Logger {
    /// Create a logger with no destinations
    pub fn new(name: impl Into<String>, threshold: Level) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(LogError::EmptyName("logger"));
        }
        let threshold = check_threshold(threshold)?;

        Ok(Self {
            id: NEXT_LOGGER_ID.fetch_add(1, Ordering::Relaxed),
            name,
            threshold: AtomicU8::new(threshold as u8),
            destinations: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn threshold(&self) -> Level {
        Level::from_u8(self.threshold.load(Ordering::Acquire))
    }

    /// Attached destinations, in attachment order
    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    /// Get an attached destination by name
    pub fn destination(&self, name: &str) -> Option<&Destination> {
        self.destinations.iter().find(|d| d.name() == name)
    }

    /// Attach a destination built from `spec`
    ///
    /// The destination starts with the spec's level if given, otherwise
    /// with this logger's current threshold.
    pub fn attach(&mut self, spec: DestinationSpec) -> Result<&Destination> {
        let level = spec.level.unwrap_or_else(|| self.threshold());
        let destination = Destination::new(spec.name, spec.kind, spec.formatter, level)?;
        self.destinations.push(destination);
        Ok(&self.destinations[self.destinations.len() - 1])
    }

    /// Set this logger's threshold and cascade it to every attached destination
    pub fn set_priority(&self, level: Level) -> Result<()> {
        let level = check_threshold(level)?;
        self.threshold.store(level as u8, Ordering::Release);
        for destination in &self.destinations {
            destination.set_threshold(level)?;
        }
        Ok(())
    }

    /// Log a message at `level`
    ///
    /// Failures are confined to the destination they happen on; the
    /// remaining destinations are still written.
    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        if !self.threshold().permits(level) || self.destinations.is_empty() {
            return;
        }

        for destination in &self.destinations {
            let Some(formatter) = destination.formatter() else {
                continue;
            };
            if !destination.permits(level) {
                continue;
            }
            let formatter = if level == Level::Data {
                Formatter::Plain
            } else {
                formatter
            };

            let delivered = buffer::with_thread_buffer(self.id, |buffer| {
                let text = formatter.render(buffer, args)?;
                destination.append(level, text)
            });

            if let Err(e) = delivered {
                tracing::trace!(
                    logger = %self.name,
                    destination = destination.name(),
                    error = %e,
                    "message dropped"
                );
            }
        }
    }

    /// Run a rotation check on every destination; returns the failure count
    pub fn rotate_all(&self) -> usize {
        self.destinations
            .iter()
            .filter(|d| d.rotate_check().is_err())
            .count()
    }

    /// Close every destination; returns the failure count
    pub fn close_all(&self) -> usize {
        self.destinations
            .iter()
            .filter(|d| d.close().is_err())
            .count()
    }
}
