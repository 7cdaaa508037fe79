//! Tracing Infrastructure
//!
//! Structured logging for the acquisition tool, built on `tracing` and
//! `tracing-subscriber`:
//! - Multiple output formats (pretty, compact, JSON)
//! - Environment-based filtering (`RUST_LOG` overrides the configured level)
//! - Level and format taken from [`Settings`]
//!
//! # Example
//! ```no_run
//! use temp_daq::{config::Settings, logging};
//! use tracing::info;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load()?;
//! logging::init_from_settings(&settings)?;
//! info!("Application started");
//! # Ok(())
//! # }
//! ```

use crate::config::Settings;
use std::io::IsTerminal;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Output format for tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed format with colors (for development)
    Pretty,
    /// Compact format without colors
    Compact,
    /// JSON format for structured logging (for log aggregation)
    Json,
}

/// Tracing configuration options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level
    pub level: Level,
    /// Output format
    pub format: OutputFormat,
    /// Whether to include file and line numbers
    pub with_file_and_line: bool,
    /// Whether to enable ANSI colors (only for Pretty format)
    pub with_ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: OutputFormat::Pretty,
            with_file_and_line: false,
            with_ansi: true,
        }
    }
}

impl TracingConfig {
    /// Create tracing config from application settings
    pub fn from_settings(settings: &Settings) -> Result<Self, String> {
        Ok(Self {
            level: parse_log_level(&settings.log_level)?,
            format: parse_output_format(&settings.log_format)?,
            ..Default::default()
        })
    }

    /// Enable or disable ANSI colors
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }
}

/// Initialize tracing from application settings.
///
/// Colors are only enabled when stderr is a terminal.
pub fn init_from_settings(settings: &Settings) -> Result<(), String> {
    let config =
        TracingConfig::from_settings(settings)?.with_ansi(std::io::stderr().is_terminal());
    init(config)
}

/// Initialize tracing.
///
/// Returns `Ok(())` without changes if a global subscriber is already installed.
pub fn init(config: TracingConfig) -> Result<(), String> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_lowercase()));

    let layer = match config.format {
        OutputFormat::Pretty => fmt::layer()
            .pretty()
            .with_file(config.with_file_and_line)
            .with_line_number(config.with_file_and_line)
            .with_ansi(config.with_ansi)
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed(),
        OutputFormat::Compact => fmt::layer()
            .compact()
            .with_file(config.with_file_and_line)
            .with_line_number(config.with_file_and_line)
            .with_ansi(false)
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed(),
        OutputFormat::Json => fmt::layer()
            .json()
            .with_file(config.with_file_and_line)
            .with_line_number(config.with_file_and_line)
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .or_else(|e| {
            // Already initialized is expected in tests
            if tracing::dispatcher::has_been_set()
                || e.to_string()
                    .contains("a global default trace dispatcher has already been set")
            {
                Ok(())
            } else {
                Err(format!("Failed to initialize tracing: {}", e))
            }
        })
}

/// Parse log level string into tracing Level
pub fn parse_log_level(level: &str) -> Result<Level, String> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(format!(
            "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
            level
        )),
    }
}

/// Parse output format string
pub fn parse_output_format(format: &str) -> Result<OutputFormat, String> {
    match format.to_lowercase().as_str() {
        "pretty" => Ok(OutputFormat::Pretty),
        "compact" => Ok(OutputFormat::Compact),
        "json" => Ok(OutputFormat::Json),
        _ => Err(format!(
            "Invalid log format '{}'. Must be one of: pretty, compact, json",
            format
        )),
    }
}
