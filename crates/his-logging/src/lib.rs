//! Logging setup for the HIS reference-data services
//!
//! # Features
//!
//! - **JSONL Output**: Structured JSON lines for log aggregation (default)
//! - **Pretty Console**: Human-readable output for development
//! - **File Rotation**: Daily/hourly log rotation via tracing-appender
//!
//! # Quick Start
//!
//! ```ignore
//! use his_logging::{HisSubscriberBuilder, LogConfig};
//!
//! // JSONL to console
//! let _guard = HisSubscriberBuilder::new().try_init()?;
//!
//! // Pretty output while developing
//! let _guard = HisSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .try_init()?;
//! ```
//!
//! `RUST_LOG` takes precedence over the configured level.

pub mod config;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type Base = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<Base> + Send + Sync>;

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to prepare log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to install subscriber: {0}")]
    Init(String),
}

/// Builder for configuring and installing the global subscriber
///
/// By default console output uses JSONL. Use [`LogConfig::development`] for
/// human-readable output.
#[derive(Debug, Clone, Default)]
pub struct HisSubscriberBuilder {
    config: LogConfig,
}

impl HisSubscriberBuilder {
    /// Create a builder with the default configuration (JSONL to console)
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    fn jsonl_layer<W>(&self, writer: W) -> BoxedLayer
    where
        W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
    {
        let jsonl = &self.config.jsonl;
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(jsonl.include_spans)
            .flatten_event(jsonl.flatten_events)
            .with_file(jsonl.include_location)
            .with_line_number(jsonl.include_location)
            .with_writer(writer)
            .boxed()
    }

    /// Install the subscriber globally
    ///
    /// The returned guard flushes file output on drop and must be kept alive
    /// for as long as the program logs.
    ///
    /// # Errors
    ///
    /// Fails if the log file cannot be created or a global subscriber is
    /// already set.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.default_level));

        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guard = None;

        if self.config.console.enabled {
            if self.config.console.pretty {
                layers.push(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(self.config.console.ansi)
                        .with_target(true)
                        .boxed(),
                );
            } else {
                layers.push(self.jsonl_layer(std::io::stdout));
            }
        }

        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = file_writer(file_config)?;
            guard = Some(file_guard);
            layers.push(self.jsonl_layer(writer));
        }

        Registry::default()
            .with(env_filter)
            .with(layers)
            .try_init()
            .map_err(|e| LoggingError::Init(e.to_string()))?;

        Ok(guard)
    }
}

fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&config.directory)?;
    let writer = match config.rotation {
        RotationStrategy::Never => {
            let path = config.directory.join(format!("{}.log", config.prefix));
            tracing_appender::non_blocking(File::create(path)?)
        }
        RotationStrategy::Daily => tracing_appender::non_blocking(RollingFileAppender::new(
            Rotation::DAILY,
            &config.directory,
            &config.prefix,
        )),
        RotationStrategy::Hourly => tracing_appender::non_blocking(RollingFileAppender::new(
            Rotation::HOURLY,
            &config.directory,
            &config.prefix,
        )),
    };
    Ok(writer)
}

/// Install JSONL console logging, ignoring an already-set subscriber
pub fn init_default() {
    let _ = HisSubscriberBuilder::new().try_init();
}

/// Install pretty debug logging, ignoring an already-set subscriber
pub fn init_development() {
    let _ = HisSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .try_init();
}

/// Install warn-level logging for tests
pub fn init_testing() {
    let _ = HisSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}
