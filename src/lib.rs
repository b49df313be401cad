//! Rotalog - multi-destination logging for multi-threaded processes
//!
//! Named loggers fan messages out to console and rotating-file
//! destinations. Messages are rendered into a per-thread buffer, each
//! destination serializes its own writes, and a background ticker rotates
//! files on time-based rules.
//!
//! ```no_run
//! use rotalog::{log_info, DestinationKind, DestinationSpec, Formatter, Level, Logger};
//!
//! let mut logger = Logger::new("app", Level::Info)?;
//! logger.attach(
//!     DestinationSpec::new("main", DestinationKind::HourFile { path: "/var/log/app.log".into() })
//!         .formatter(Formatter::Identified),
//! )?;
//! log_info!(logger, "listening on {}", 8080);
//! # Ok::<(), rotalog::LogError>(())
//! ```

#[macro_use]
mod macros;

pub mod buffer;
pub mod config;
pub mod destination;
pub mod diagnostic;
pub mod error;
pub mod format;
pub mod level;
pub mod logger;
pub mod registry;
pub mod ticker;

pub use buffer::MessageBuffer;
pub use config::Config;
pub use destination::{Destination, DestinationKind, DestinationSpec, Rotation};
pub use error::{LogError, Result};
pub use format::Formatter;
pub use level::Level;
pub use logger::Logger;
pub use registry::Registry;
pub use ticker::{RotationTicker, TickerConfig, TickerHandle, TickerStats};
