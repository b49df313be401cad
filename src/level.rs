//! Severity levels
//!
//! Levels are ordered from most severe to most verbose. A message is emitted
//! when the threshold is numerically greater than or equal to its level.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LogError;

/// Log severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum Level {
    /// Data records, always rendered with the plain formatter
    Data = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    /// Sentinel for unparseable input
    Unknown = 5,
}

impl Level {
    /// Get the display name for this level
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Data => "DATA",
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Unknown => "UNKNOWN",
        }
    }

    /// Parse a level name, yielding `Unknown` for anything unrecognized
    ///
    /// Matching is exact and case-sensitive.
    pub fn parse(name: &str) -> Level {
        match name {
            "DATA" => Level::Data,
            "ERROR" => Level::Error,
            "WARN" => Level::Warn,
            "INFO" => Level::Info,
            "DEBUG" => Level::Debug,
            _ => Level::Unknown,
        }
    }

    /// Whether this level may be used as a logger or destination threshold
    pub fn is_valid_threshold(&self) -> bool {
        (Level::Error..=Level::Debug).contains(self)
    }

    /// Whether a message at `level` passes a gate set to `self`
    pub fn permits(&self, level: Level) -> bool {
        *self >= level
    }

    pub(crate) fn from_u8(raw: u8) -> Level {
        match raw {
            0 => Level::Data,
            1 => Level::Error,
            2 => Level::Warn,
            3 => Level::Info,
            4 => Level::Debug,
            _ => Level::Unknown,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Level::parse(s) {
            Level::Unknown => Err(LogError::InvalidLevel(s.to_string())),
            level => Ok(level),
        }
    }
}

/// Threshold that rejects anything outside `ERROR..=DEBUG`
pub(crate) fn check_threshold(level: Level) -> Result<Level, LogError> {
    if level.is_valid_threshold() {
        Ok(level)
    } else {
        Err(LogError::InvalidLevel(level.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Level; 6] = [
        Level::Data,
        Level::Error,
        Level::Warn,
        Level::Info,
        Level::Debug,
        Level::Unknown,
    ];

    #[test]
    fn test_parse_known_levels() {
        assert_eq!(Level::parse("DATA"), Level::Data);
        assert_eq!(Level::parse("ERROR"), Level::Error);
        assert_eq!(Level::parse("WARN"), Level::Warn);
        assert_eq!(Level::parse("INFO"), Level::Info);
        assert_eq!(Level::parse("DEBUG"), Level::Debug);
    }

    #[test]
    fn test_parse_rejects_everything_else() {
        assert_eq!(Level::parse("bogus"), Level::Unknown);
        assert_eq!(Level::parse(""), Level::Unknown);
        assert_eq!(Level::parse("debug"), Level::Unknown);
        assert_eq!(Level::parse(" INFO"), Level::Unknown);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("WARN".parse::<Level>().unwrap(), Level::Warn);
        assert!("UNKNOWN".parse::<Level>().is_err());
        assert!("trace".parse::<Level>().is_err());
    }

    #[test]
    fn test_gating_is_monotonic() {
        // Whenever a more verbose message passes, every more severe one does too
        for threshold in ALL {
            for (i, verbose) in ALL.iter().enumerate() {
                if threshold.permits(*verbose) {
                    for severe in &ALL[..=i] {
                        assert!(threshold.permits(*severe), "{threshold} {severe} {verbose}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_debug_threshold_is_most_permissive() {
        assert!(Level::Debug.permits(Level::Debug));
        assert!(Level::Debug.permits(Level::Data));
        assert!(!Level::Debug.permits(Level::Unknown));
        assert!(!Level::Info.permits(Level::Debug));
    }

    #[test]
    fn test_valid_thresholds() {
        assert!(!Level::Data.is_valid_threshold());
        assert!(Level::Error.is_valid_threshold());
        assert!(Level::Debug.is_valid_threshold());
        assert!(!Level::Unknown.is_valid_threshold());
        assert!(check_threshold(Level::Unknown).is_err());
    }

    #[test]
    fn test_u8_round_trip() {
        for level in ALL {
            assert_eq!(Level::from_u8(level as u8), level);
        }
    }
}
