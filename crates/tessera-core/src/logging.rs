//! Structured logging setup.
//!
//! The planner reports through `tracing` events: allocations and rewrites at
//! `debug`, pass summaries and the allocator usage report at `info`. This
//! module installs a `tracing-subscriber` pipeline for binaries and tests
//! that want to see them.

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level to display when `RUST_LOG` is unset.
    pub level: LogLevel,
    /// Include timestamps.
    pub with_timestamps: bool,
    /// Include thread ids.
    pub with_thread_ids: bool,
    /// Include file and line of the call site.
    pub with_source_location: bool,
    /// Log span enter/close events.
    pub with_span_events: bool,
    /// Emit JSON lines instead of human-readable text.
    pub json_format: bool,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Every allocation and link update.
    Trace,
    /// Per-tensor placement and per-rewrite detail.
    Debug,
    /// Pass summaries and memory reports.
    Info,
    /// Suspicious but accepted input.
    Warn,
    /// Failures only.
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            with_timestamps: true,
            with_thread_ids: false,
            with_source_location: false,
            with_span_events: false,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum level.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Enable or disable timestamps.
    pub fn with_timestamps(mut self, enable: bool) -> Self {
        self.with_timestamps = enable;
        self
    }

    /// Enable or disable thread ids.
    pub fn with_thread_ids(mut self, enable: bool) -> Self {
        self.with_thread_ids = enable;
        self
    }

    /// Enable or disable source locations.
    pub fn with_source_location(mut self, enable: bool) -> Self {
        self.with_source_location = enable;
        self
    }

    /// Enable or disable span events.
    pub fn with_span_events(mut self, enable: bool) -> Self {
        self.with_span_events = enable;
        self
    }

    /// Enable or disable JSON output.
    pub fn with_json_format(mut self, enable: bool) -> Self {
        self.json_format = enable;
        self
    }

    /// Verbose settings for working on a planner pipeline.
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            with_timestamps: true,
            with_thread_ids: false,
            with_source_location: true,
            with_span_events: true,
            json_format: false,
        }
    }

    /// Minimal JSON output for log aggregation.
    pub fn production() -> Self {
        Self {
            level: LogLevel::Info,
            with_timestamps: true,
            with_thread_ids: false,
            with_source_location: false,
            with_span_events: false,
            json_format: true,
        }
    }
}

/// Install the global subscriber.
///
/// Returns `false` if a subscriber was already installed, so repeated calls
/// from tests are harmless.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.to_tracing_level().as_str()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let span_events = if config.with_span_events {
        FmtSpan::ENTER | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    match (config.json_format, config.with_timestamps) {
        (true, _) => registry
            .with(
                fmt::layer()
                    .json()
                    .with_span_events(span_events)
                    .with_current_span(true)
                    .with_thread_ids(config.with_thread_ids)
                    .with_file(config.with_source_location)
                    .with_line_number(config.with_source_location),
            )
            .try_init()
            .is_ok(),
        (false, true) => registry
            .with(
                fmt::layer()
                    .with_span_events(span_events)
                    .with_thread_ids(config.with_thread_ids)
                    .with_file(config.with_source_location)
                    .with_line_number(config.with_source_location)
                    .with_target(config.with_source_location),
            )
            .try_init()
            .is_ok(),
        (false, false) => registry
            .with(
                fmt::layer()
                    .without_time()
                    .with_span_events(span_events)
                    .with_thread_ids(config.with_thread_ids)
                    .with_file(config.with_source_location)
                    .with_line_number(config.with_source_location)
                    .with_target(config.with_source_location),
            )
            .try_init()
            .is_ok(),
    }
}

/// Install the global subscriber with [`LoggingConfig::default`].
pub fn init_default_logging() -> bool {
    init_logging(&LoggingConfig::default())
}
