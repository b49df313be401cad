//! Rotation ticker
//!
//! One background thread that wakes on a fixed interval and runs a rotation
//! check on every destination of every registered logger, independent of
//! any logging call. The thread stops when its handle is shut down or
//! dropped.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{LogError, Result};
use crate::registry::Registry;

/// Time between rotation passes
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Delay before the first pass, so application threads can start logging
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Ticker timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickerConfig {
    pub interval: Duration,
    pub grace: Duration,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_TICK_INTERVAL,
            grace: DEFAULT_GRACE_PERIOD,
        }
    }
}

/// Counters reported when the ticker stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickerStats {
    /// Completed rotation passes
    pub passes: u64,
    /// Destination checks that failed, summed over all passes
    pub failures: u64,
}

/// Handle to a running ticker
///
/// Dropping the handle stops the ticker and waits for its thread.
#[derive(Debug)]
pub struct TickerHandle {
    shutdown_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<TickerStats>>,
}

impl TickerHandle {
    /// Whether the ticker thread is still running
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the ticker and wait for it, returning its counters
    pub fn shutdown(mut self) -> TickerStats {
        self.stop()
    }

    fn stop(&mut self) -> TickerStats {
        if let Some(tx) = self.shutdown_tx.take() {
            // Ignore error if the thread is already gone
            let _ = tx.send(());
        }
        match self.thread.take().map(JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                tracing::error!("rotation ticker panicked");
                TickerStats::default()
            }
            None => TickerStats::default(),
        }
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Background rotation driver
pub struct RotationTicker;

impl RotationTicker {
    /// Start the ticker thread over `registry`
    pub fn start(registry: Arc<Registry>, config: TickerConfig) -> Result<TickerHandle> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("rotalog-ticker".to_string())
            .spawn(move || run(&registry, config, &shutdown_rx))
            .map_err(|e| LogError::io("spawn rotation ticker", e))?;

        tracing::debug!(
            interval_ms = config.interval.as_millis() as u64,
            grace_ms = config.grace.as_millis() as u64,
            "rotation ticker started"
        );

        Ok(TickerHandle {
            shutdown_tx: Some(shutdown_tx),
            thread: Some(thread),
        })
    }
}

fn run(registry: &Registry, config: TickerConfig, shutdown: &mpsc::Receiver<()>) -> TickerStats {
    let mut stats = TickerStats::default();

    if !matches!(shutdown.recv_timeout(config.grace), Err(RecvTimeoutError::Timeout)) {
        return stats;
    }

    loop {
        match shutdown.recv_timeout(config.interval) {
            Err(RecvTimeoutError::Timeout) => {
                stats.passes += 1;
                stats.failures += registry.rotate_all() as u64;
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    tracing::debug!(passes = stats.passes, failures = stats.failures, "rotation ticker stopped");
    stats
}
