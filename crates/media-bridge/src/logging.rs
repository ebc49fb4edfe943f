use std::env;
use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingSettings;
use crate::error::Error;
use crate::Result;

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level used when `RUST_LOG` is not set
    pub level: Level,
    /// Whether to enable JSON formatting
    pub json: bool,
    /// Whether to include file and line information
    pub file_info: bool,
}

impl TryFrom<&LoggingSettings> for LoggingConfig {
    type Error = Error;

    fn try_from(settings: &LoggingSettings) -> Result<Self> {
        Ok(LoggingConfig {
            level: parse_log_level(&settings.level)?,
            json: settings.json,
            file_info: settings.file_info,
        })
    }
}

/// Install the global subscriber.
///
/// A non-empty `RUST_LOG` takes precedence over the configured level.
pub fn setup_logging(config: &LoggingConfig) -> Result<()> {
    let directives = env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = env_filter(config.level, directives.as_deref())?;

    let builder = fmt()
        .with_env_filter(filter)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| {
        Error::ConfigError(format!("Failed to install tracing subscriber: {}", e))
    })
}

fn env_filter(level: Level, directives: Option<&str>) -> Result<EnvFilter> {
    match directives.map(str::trim).filter(|d| !d.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives).map_err(|e| {
            Error::ConfigError(format!("Invalid {} directives: {}", EnvFilter::DEFAULT_ENV, e))
        }),
        None => Ok(EnvFilter::default().add_directive(level.into())),
    }
}

/// Parse a log level from a string
pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level).map_err(|_| Error::ConfigError(format!("Invalid log level: {}", level)))
}
