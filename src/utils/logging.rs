//! Logging subscriber setup
//!
//! Logs always go to stderr; stdout carries the JSON records.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::error::{InterpError, InterpResult};

/// Default filter when neither `--log-level` nor `SMOOTHFPS_LOG` is set
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact text format
    #[default]
    Compact,
    /// Human-readable multi-line format
    Pretty,
    /// JSON format for structured logging
    Json,
}

/// Parse a level or `EnvFilter` directive string
pub fn build_filter(directives: &str) -> InterpResult<EnvFilter> {
    EnvFilter::try_new(directives).map_err(|e| InterpError::ConfigError {
        message: format!("Invalid log level '{}': {}", directives, e),
    })
}

/// Install the global subscriber. A subscriber that is already installed
/// is left in place.
pub fn init_logging(directives: &str, format: LogFormat) -> InterpResult<()> {
    let filter = build_filter(directives)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(e) = installed {
        debug!("Keeping existing log subscriber: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter() {
        assert!(build_filter("warn").is_ok());
        assert!(build_filter("smoothfps_cli=debug,info").is_ok());
        assert!(matches!(
            build_filter("smoothfps_cli=loud"),
            Err(InterpError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_log_format_names() {
        assert_eq!(LogFormat::from_str("json", true).unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::default(), LogFormat::Compact);
    }

    #[test]
    fn test_second_init_keeps_first_subscriber() {
        assert!(init_logging("warn", LogFormat::Compact).is_ok());
        assert!(init_logging("debug", LogFormat::Json).is_ok());
        assert!(matches!(
            init_logging("smoothfps_cli=loud", LogFormat::Compact),
            Err(InterpError::ConfigError { .. })
        ));
    }
}
