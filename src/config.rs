//! Configuration for Rotalog
//!
//! Describes loggers and their destinations in TOML, and builds a
//! [`Registry`] from that description.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::destination::{DestinationKind, DestinationSpec};
use crate::diagnostic;
use crate::error::LogError;
use crate::format::Formatter;
use crate::level::Level;
use crate::logger::Logger;
use crate::registry::Registry;
use crate::ticker::TickerConfig;

/// Ticker timing section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TickerSettings {
    /// Milliseconds between rotation passes (default: 100)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Seconds to wait before the first pass (default: 5)
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,
}

fn default_interval_ms() -> u64 {
    100
}

fn default_grace_secs() -> u64 {
    5
}

impl Default for TickerSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            grace_secs: default_grace_secs(),
        }
    }
}

/// Sink kind and its options, as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    Console,
    TimeFile {
        path: String,
        /// Seconds a file stays open before it is rotated (default: 3600)
        #[serde(default = "default_span_secs")]
        span_secs: u64,
    },
    HourFile {
        path: String,
    },
}

fn default_span_secs() -> u64 {
    3600
}

/// One destination of a logger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DestinationConfig {
    pub name: String,

    #[serde(flatten)]
    pub sink: SinkConfig,

    /// Formatter name: "plain" (default) or "identified"
    #[serde(default = "default_formatter")]
    pub formatter: String,

    /// Threshold for this destination; the logger's level when absent
    #[serde(default)]
    pub level: Option<Level>,
}

fn default_formatter() -> String {
    Formatter::Plain.name().to_string()
}

/// One logger and its destinations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggerConfig {
    pub name: String,

    /// Logger threshold (default: DEBUG)
    #[serde(default = "default_level")]
    pub level: Level,

    #[serde(default)]
    pub destinations: Vec<DestinationConfig>,
}

fn default_level() -> Level {
    Level::Debug
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Side file for engine failures (default: rotalog.err in the temp dir)
    #[serde(default)]
    pub diagnostics_path: Option<String>,

    #[serde(default)]
    pub ticker: TickerSettings,

    #[serde(default)]
    pub loggers: Vec<LoggerConfig>,
}

impl Config {
    /// Load configuration from the default file, or return default if not found
    pub fn load() -> Result<Self> {
        let path = config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from `path`
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid rotalog configuration")
    }

    /// Ticker timing from the `[ticker]` section
    pub fn ticker_config(&self) -> TickerConfig {
        TickerConfig {
            interval: Duration::from_millis(self.ticker.interval_ms),
            grace: Duration::from_secs(self.ticker.grace_secs),
        }
    }

    /// Point the diagnostic channel at the configured path, if any
    ///
    /// Returns `false` when the channel was already configured or in use.
    pub fn install_diagnostics(&self) -> crate::Result<bool> {
        match &self.diagnostics_path {
            Some(path) => Ok(diagnostic::set_path(expand_path(path)?)),
            None => Ok(false),
        }
    }

    /// Build a registry holding every configured logger
    pub fn build_registry(&self) -> crate::Result<Registry> {
        if self.ticker.interval_ms == 0 {
            return Err(LogError::Config(
                "ticker interval_ms must be greater than zero".to_string(),
            ));
        }

        let mut registry = Registry::new();
        for logger_config in &self.loggers {
            let logger = build_logger(logger_config)?;
            registry.register(logger)?;
        }
        Ok(registry)
    }
}

fn build_logger(config: &LoggerConfig) -> crate::Result<Logger> {
    let mut logger = Logger::new(&config.name, config.level)?;

    for dest in &config.destinations {
        if logger.destination(&dest.name).is_some() {
            return Err(LogError::Config(format!(
                "logger '{}' has more than one destination named '{}'",
                config.name, dest.name
            )));
        }

        let formatter = Formatter::from_name(&dest.formatter);
        if formatter.is_none() {
            tracing::warn!(
                logger = %config.name,
                destination = %dest.name,
                formatter = %dest.formatter,
                "unknown formatter, destination will be skipped"
            );
        }

        let kind = match &dest.sink {
            SinkConfig::Console => DestinationKind::Console,
            SinkConfig::TimeFile { path, span_secs } => DestinationKind::TimeFile {
                path: file_path(&config.name, &dest.name, path)?,
                span_secs: *span_secs,
            },
            SinkConfig::HourFile { path } => DestinationKind::HourFile {
                path: file_path(&config.name, &dest.name, path)?,
            },
        };

        logger.attach(DestinationSpec {
            name: dest.name.clone(),
            kind,
            formatter,
            level: dest.level,
        })?;
    }

    Ok(logger)
}

fn file_path(logger: &str, destination: &str, raw: &str) -> crate::Result<PathBuf> {
    if raw.trim().is_empty() {
        return Err(LogError::Config(format!(
            "destination '{}' of logger '{}' has an empty path",
            destination, logger
        )));
    }
    expand_path(raw)
}

/// Expand `~` and environment variables in a configured path
fn expand_path(raw: &str) -> crate::Result<PathBuf> {
    shellexpand::full(raw)
        .map(|expanded| PathBuf::from(expanded.as_ref()))
        .map_err(|e| LogError::Config(format!("cannot expand path '{}': {}", raw, e)))
}

/// Get the base configuration directory (~/.rotalog)
/// Falls back to ./.rotalog if home directory cannot be determined
pub fn config_dir() -> PathBuf {
    try_config_dir().unwrap_or_else(|| {
        tracing::warn!("Could not determine home directory, using current directory for config");
        PathBuf::from(".rotalog")
    })
}

/// Try to get the base configuration directory, returning None if home dir is unavailable
pub fn try_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".rotalog"))
}

/// Get the path to the config file
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[ticker]
interval_ms = 250

[[loggers]]
name = "app"
level = "INFO"

[[loggers.destinations]]
name = "main"
kind = "time_file"
path = "/tmp/app.log"
span_secs = 3600
formatter = "identified"
level = "DEBUG"

[[loggers.destinations]]
name = "console"
kind = "console"

[[loggers]]
name = "audit"

[[loggers.destinations]]
name = "hourly"
kind = "hour_file"
path = "/tmp/audit.log"
"#;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.loggers.is_empty());
        assert_eq!(config.ticker_config(), TickerConfig::default());
        assert!(config.diagnostics_path.is_none());
    }

    #[test]
    fn test_parse_sample() {
        let config = Config::from_toml(SAMPLE).unwrap();
        assert_eq!(config.ticker.interval_ms, 250);
        assert_eq!(config.ticker.grace_secs, 5);
        assert_eq!(config.loggers.len(), 2);

        let app = &config.loggers[0];
        assert_eq!(app.level, Level::Info);
        assert_eq!(
            app.destinations[0].sink,
            SinkConfig::TimeFile {
                path: "/tmp/app.log".to_string(),
                span_secs: 3600
            }
        );
        assert_eq!(app.destinations[0].level, Some(Level::Debug));
        assert_eq!(app.destinations[1].sink, SinkConfig::Console);
        assert_eq!(app.destinations[1].formatter, "plain");

        assert_eq!(config.loggers[1].level, Level::Debug);
    }

    #[test]
    fn test_build_registry() {
        let registry = Config::from_toml(SAMPLE).unwrap().build_registry().unwrap();
        assert_eq!(registry.len(), 2);

        let app = registry.get("app").unwrap();
        assert_eq!(app.threshold(), Level::Info);
        let main = app.destination("main").unwrap();
        assert_eq!(main.kind(), "time_file");
        assert_eq!(main.threshold(), Level::Debug);
        assert_eq!(main.formatter(), Some(Formatter::Identified));
        assert_eq!(main.path(), Some(PathBuf::from("/tmp/app.log")));
        // Inherits the logger's level
        assert_eq!(app.destination("console").unwrap().threshold(), Level::Info);

        let audit = registry.get("audit").unwrap();
        assert_eq!(audit.destination("hourly").unwrap().kind(), "hour_file");
    }

    #[test]
    fn test_unknown_level_is_rejected() {
        let result = Config::from_toml("[[loggers]]\nname = \"app\"\nlevel = \"LOUD\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_data_threshold_is_rejected() {
        let config = Config::from_toml("[[loggers]]\nname = \"app\"\nlevel = \"DATA\"\n").unwrap();
        assert!(matches!(config.build_registry(), Err(LogError::InvalidLevel(_))));
    }

    #[test]
    fn test_duplicate_logger_is_rejected() {
        let config =
            Config::from_toml("[[loggers]]\nname = \"app\"\n[[loggers]]\nname = \"app\"\n").unwrap();
        assert!(matches!(config.build_registry(), Err(LogError::DuplicateLogger(_))));
    }

    #[test]
    fn test_duplicate_destination_is_rejected() {
        let config = Config::from_toml(
            "[[loggers]]\nname = \"app\"\n[[loggers.destinations]]\nname = \"out\"\nkind = \"console\"\n[[loggers.destinations]]\nname = \"out\"\nkind = \"hour_file\"\npath = \"/tmp/out.log\"\n",
        )
        .unwrap();
        let err = config.build_registry().unwrap_err();
        assert!(matches!(err, LogError::Config(_)));
        let msg = err.to_string();
        assert!(msg.contains("'app'"));
        assert!(msg.contains("'out'"));
    }

    #[test]
    fn test_same_destination_name_under_different_loggers_is_allowed() {
        let config = Config::from_toml(
            "[[loggers]]\nname = \"a\"\n[[loggers.destinations]]\nname = \"out\"\nkind = \"console\"\n[[loggers]]\nname = \"b\"\n[[loggers.destinations]]\nname = \"out\"\nkind = \"console\"\n",
        )
        .unwrap();
        assert_eq!(config.build_registry().unwrap().len(), 2);
    }

    #[test]
    fn test_empty_path_is_rejected() {
        let config = Config::from_toml(
            "[[loggers]]\nname = \"app\"\n[[loggers.destinations]]\nname = \"f\"\nkind = \"hour_file\"\npath = \"\"\n",
        )
        .unwrap();
        let err = config.build_registry().unwrap_err();
        assert!(err.to_string().contains("empty path"));
    }

    #[test]
    fn test_zero_span_is_rejected() {
        let config = Config::from_toml(
            "[[loggers]]\nname = \"app\"\n[[loggers.destinations]]\nname = \"f\"\nkind = \"time_file\"\npath = \"/tmp/x.log\"\nspan_secs = 0\n",
        )
        .unwrap();
        assert!(matches!(config.build_registry(), Err(LogError::InvalidSpan(_))));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let config = Config::from_toml("[ticker]\ninterval_ms = 0\n").unwrap();
        assert!(matches!(config.build_registry(), Err(LogError::Config(_))));
    }

    #[test]
    fn test_unknown_formatter_attaches_without_formatter() {
        let config = Config::from_toml(
            "[[loggers]]\nname = \"app\"\n[[loggers.destinations]]\nname = \"c\"\nkind = \"console\"\nformatter = \"fancy\"\n",
        )
        .unwrap();
        let registry = config.build_registry().unwrap();
        let dest_formatter = registry.get("app").unwrap().destination("c").unwrap().formatter();
        assert_eq!(dest_formatter, None);
    }

    #[test]
    fn test_path_expansion() {
        std::env::set_var("ROTALOG_TEST_LOG_DIR", "/var/tmp/rotalog-test");
        let path = expand_path("$ROTALOG_TEST_LOG_DIR/app.log").unwrap();
        assert_eq!(path, PathBuf::from("/var/tmp/rotalog-test/app.log"));
        assert!(expand_path("$ROTALOG_SURELY_UNSET_VAR/app.log").is_err());
    }

    #[test]
    fn test_load_from_file_and_log() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("app.log");
        let config_path = dir.path().join("config.toml");
        let content = format!(
            "[[loggers]]\nname = \"app\"\nlevel = \"INFO\"\n[[loggers.destinations]]\nname = \"main\"\nkind = \"time_file\"\npath = \"{}\"\n",
            log_path.display()
        );
        std::fs::write(&config_path, content).unwrap();

        let registry = Config::load_from(&config_path).unwrap().build_registry().unwrap();
        let app = registry.get("app").unwrap();
        app.log(Level::Debug, format_args!("suppressed"));
        app.log(Level::Error, format_args!("visible"));

        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert!(!contents.contains("suppressed"));
        assert!(contents.contains("visible"));
        assert_eq!(
            app.destination("main").unwrap().rotation(),
            Some(crate::destination::Rotation::Interval { span_secs: 3600 })
        );
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load_from(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn test_config_dir_does_not_panic() {
        let dir = config_dir();
        assert!(dir.ends_with(".rotalog"));
        assert!(config_file_path().ends_with("config.toml"));
    }
}
