//! Logging setup and the console line format for message exchanges.
//!
//! Exchange lines look like `(0.153)(3f2a...)-> {"op":"login"}`: latency
//! in seconds since the previous event of the session, the session id and
//! a direction arrow. Everything else about a session is logged as
//! `(3f2a...) connection closed`. Both forms are easy to grep.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{span, Level, Span};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level.
    pub level: LogLevel,

    /// Whether to include the event target.
    pub targets: bool,

    /// Log format.
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level logging
    Trace,
    /// Debug level logging
    Debug,
    /// Info level logging
    Info,
    /// Warning level logging
    Warn,
    /// Error level logging
    Error,
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Plain lines without ANSI colours, for piping into files
    Plain,
    /// Pretty formatted logs
    Pretty,
    /// Compact formatted logs
    Compact,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            targets: false,
            format: LogFormat::Compact,
        }
    }
}

/// Initialize logging with configuration.
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_directive()));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(config.targets)
        .with_thread_ids(false);

    let fmt_layer = match config.format {
        LogFormat::Plain => fmt_layer.with_ansi(false).boxed(),
        LogFormat::Pretty => fmt_layer.pretty().boxed(),
        LogFormat::Compact => fmt_layer.compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| Error::internal(format!("Failed to install subscriber: {}", e)))
}

/// Direction of a message relative to the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Sent to the target
    Sent,
    /// Received from the target
    Received,
}

impl Direction {
    /// Arrow used on exchange lines.
    pub fn arrow(self) -> &'static str {
        match self {
            Self::Sent => "->",
            Self::Received => "<-",
        }
    }

    /// Label used in transcript file names.
    pub fn label(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Received => "received",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.arrow())
    }
}

/// Format a sent or received message line.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use wsfuzz::shared::logging::{format_exchange, Direction};
///
/// let line = format_exchange(Duration::from_millis(1500), "ab12", Direction::Received, "ok");
/// assert_eq!(line, "(1.500)(ab12)<- ok");
/// ```
pub fn format_exchange(
    latency: Duration,
    session_id: &str,
    direction: Direction,
    message: &str,
) -> String {
    format!(
        "({:.3})({}){} {}",
        latency.as_secs_f64(),
        session_id,
        direction.arrow(),
        message
    )
}

/// Format any other session event line.
pub fn format_event(session_id: &str, message: &str) -> String {
    format!("({}) {}", session_id, message)
}

/// Span wrapping everything a session logs.
pub fn session_span(session_id: &str) -> Span {
    span!(Level::INFO, "session", session_id = %session_id)
}
