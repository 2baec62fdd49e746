//! Tracing/logging initialization.
//!
//! JSON lines with timestamps. `RUST_LOG` wins over the configured level.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("failed to open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogDestination {
    #[default]
    Stdout,
    /// Appended to; created if missing.
    File(PathBuf),
}

impl FromStr for LogDestination {
    type Err = std::convert::Infallible;

    /// `stdout` (any case, or empty) selects stdout; anything else is a path.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("stdout") {
            Ok(Self::Stdout)
        } else {
            Ok(Self::File(PathBuf::from(s)))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// When false no subscriber is installed and events are discarded.
    pub enabled: bool,
    /// Default filter directive, e.g. `info` or `sessiongate_api=debug`.
    pub level: String,
    pub destination: LogDestination,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            destination: LogDestination::Stdout,
        }
    }
}

impl LoggingConfig {
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(config: &LoggingConfig) -> Result<(), ObservabilityError> {
    if !config.enabled {
        return Ok(());
    }

    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.filter())
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    match &config.destination {
        LogDestination::Stdout => {
            let _ = builder.try_init();
        }
        LogDestination::File(path) => {
            let file = open_append(path)?;
            let _ = builder.with_writer(Mutex::new(file)).try_init();
        }
    }

    Ok(())
}

fn open_append(path: &Path) -> Result<File, ObservabilityError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| ObservabilityError::LogFile {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_parsing() {
        assert_eq!("stdout".parse::<LogDestination>().unwrap(), LogDestination::Stdout);
        assert_eq!("STDOUT".parse::<LogDestination>().unwrap(), LogDestination::Stdout);
        assert_eq!("".parse::<LogDestination>().unwrap(), LogDestination::Stdout);
        assert_eq!(
            "/var/log/sessiongate.log".parse::<LogDestination>().unwrap(),
            LogDestination::File(PathBuf::from("/var/log/sessiongate.log"))
        );
    }

    #[test]
    fn disabled_logging_installs_nothing() {
        let config = LoggingConfig {
            enabled: false,
            destination: LogDestination::File(PathBuf::from("/nonexistent/dir/never-opened.log")),
            ..LoggingConfig::default()
        };
        assert!(init(&config).is_ok());
    }

    #[test]
    fn unwritable_log_file_is_reported() {
        let config = LoggingConfig {
            destination: LogDestination::File(PathBuf::from("/nonexistent/dir/app.log")),
            ..LoggingConfig::default()
        };
        let err = init(&config).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/dir/app.log"));
    }

    #[test]
    fn invalid_level_falls_back_instead_of_failing() {
        let config = LoggingConfig {
            level: "[[not a directive".to_string(),
            ..LoggingConfig::default()
        };
        // Filter construction must not panic.
        let _ = config.filter();
    }
}
