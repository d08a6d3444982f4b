//! Tracing subscriber setup
//!
//! Library code only emits `tracing` events; binaries call one of the init
//! functions here once at start-up. Initialization is idempotent.
//!
//! Environment:
//! - `RUST_LOG`: full filter directive, wins over everything else
//! - `HYBRID_ND_LOG_LEVEL`: error, warn, info, debug or trace
//! - `HYBRID_ND_LOG_FORMAT`: `human` or `json`

use std::str::FromStr;

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INITIALIZED: OnceCell<()> = OnceCell::new();

pub const LOG_LEVEL_ENV: &str = "HYBRID_ND_LOG_LEVEL";
pub const LOG_FORMAT_ENV: &str = "HYBRID_ND_LOG_FORMAT";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoggingError {
    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}")]
    InvalidLogFormat(String),

    #[error("invalid filter directive: {0}")]
    InvalidFilter(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLogLevel(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Compact text for terminals
    #[default]
    Human,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" | "pretty" | "text" => Ok(LogFormat::Human),
            "json" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidLogFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Include source file and line in every event
    pub with_file_info: bool,
    /// Filter directive used instead of `level`, e.g. `hybrid_nd=trace`
    pub filter: Option<String>,
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_file_info(mut self, with_file_info: bool) -> Self {
        self.with_file_info = with_file_info;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Build a config from environment-style variables.
    ///
    /// Unparseable values are errors rather than silently ignored.
    pub fn from_vars<F>(lookup: F) -> Result<Self, LoggingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = LoggingConfig::new();
        if let Some(level) = lookup(LOG_LEVEL_ENV) {
            config.level = level.parse()?;
        }
        if let Some(format) = lookup(LOG_FORMAT_ENV) {
            config.format = format.parse()?;
        }
        if let Some(filter) = lookup("RUST_LOG").filter(|f| !f.trim().is_empty()) {
            config.filter = Some(filter);
        }
        Ok(config)
    }

    pub fn from_env() -> Result<Self, LoggingError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        let directive = self
            .filter
            .as_deref()
            .unwrap_or_else(|| self.level.as_filter_str());
        EnvFilter::try_new(directive).map_err(|e| LoggingError::InvalidFilter(e.to_string()))
    }
}

/// Install the global subscriber from the environment.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    init_with_config(&LoggingConfig::from_env()?)
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_with_config(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = config.env_filter()?;
    INITIALIZED.get_or_init(|| {
        let registry = tracing_subscriber::registry().with(filter);
        // try_init: a subscriber installed elsewhere (e.g. by a test harness) wins
        let _ = match config.format {
            LogFormat::Human => registry
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_file(config.with_file_info)
                        .with_line_number(config.with_file_info),
                )
                .try_init(),
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(false)
                        .with_file(config.with_file_info)
                        .with_line_number(config.with_file_info),
                )
                .try_init(),
        };
    });
    Ok(())
}
