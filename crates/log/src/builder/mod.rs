//! Logger builder implementation
//!
//! `format` holds the layer-construction macros so the three output formats
//! share one chain of display toggles.

#[macro_use]
mod format;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, Format, WriterConfig};
use crate::error::{LogError, LogResult};

/// Logger builder
#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
}

/// Guard that keeps the logger alive
///
/// Hold it for the lifetime of `main`; the subscriber itself is global.
#[derive(Debug)]
#[must_use = "dropping the guard early ends the logging session"]
pub struct LoggerGuard {
    format: Format,
}

impl LoggerGuard {
    /// Format the installed subscriber renders
    pub fn format(&self) -> Format {
        self.format
    }
}

macro_rules! try_init_subscriber {
    ($filter:expr, $fmt_layer:expr) => {
        Registry::default()
            .with($filter)
            .with($fmt_layer)
            .try_init()
            .map_err(|e| LogError::AlreadyInitialized(e.to_string()))
    };
}

impl LoggerBuilder {
    /// Create builder from config
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Parse the level directive without installing anything
    pub fn filter(&self) -> LogResult<EnvFilter> {
        EnvFilter::try_new(&self.config.level).map_err(|e| LogError::Filter {
            filter: self.config.level.clone(),
            reason: e.to_string(),
        })
    }

    /// Build and install the global subscriber
    ///
    /// # Errors
    ///
    /// - [`LogError::Filter`] when the level directive cannot be parsed
    /// - [`LogError::AlreadyInitialized`] when a global subscriber exists
    pub fn build(self) -> LogResult<LoggerGuard> {
        let filter = self.filter()?;
        let writer = make_writer(self.config.writer);
        let display = &self.config.display;

        match self.config.format {
            Format::Pretty => {
                let layer = create_fmt_layer!(pretty, display, writer);
                try_init_subscriber!(filter, layer)?;
            }
            Format::Compact => {
                let layer = create_fmt_layer!(compact, display, writer);
                try_init_subscriber!(filter, layer)?;
            }
            Format::Json => {
                let layer = create_json_layer!(display, writer);
                try_init_subscriber!(filter, layer)?;
            }
        }

        Ok(LoggerGuard {
            format: self.config.format,
        })
    }
}

fn make_writer(config: WriterConfig) -> BoxMakeWriter {
    match config {
        WriterConfig::Stderr => BoxMakeWriter::new(std::io::stderr),
        WriterConfig::Stdout => BoxMakeWriter::new(std::io::stdout),
    }
}
