//! Configuration types
//!
//! - [`Config`]: level filter, output format, writer and display toggles
//! - `presets`: development, production and environment-driven setups

mod presets;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LogError;

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level filter (e.g., "info", "debug,reqwest=warn")
    pub level: String,

    /// Output format
    pub format: Format,

    /// Output writer
    pub writer: WriterConfig,

    /// Display configuration
    pub display: DisplayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::Compact,
            writer: WriterConfig::Stderr,
            display: DisplayConfig::default(),
        }
    }
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Human-readable with colors and indentation
    Pretty,
    /// Compact single-line output
    Compact,
    /// Structured JSON output
    Json,
}

impl FromStr for Format {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(LogError::Format(other.to_string())),
        }
    }
}

/// Writer configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriterConfig {
    /// Write to stderr
    #[default]
    Stderr,
    /// Write to stdout
    Stdout,
}

/// Display configuration
///
/// Independent toggles that map directly onto the fmt layer builders.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Show timestamps
    pub time: bool,
    /// Show source location (`file:line`)
    pub source: bool,
    /// Show target module
    pub target: bool,
    /// Use ANSI colors
    pub colors: bool,
    /// Flatten JSON events
    pub flatten: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            time: true,
            source: cfg!(debug_assertions),
            target: true,
            colors: std::io::IsTerminal::is_terminal(&std::io::stderr()),
            flatten: true,
        }
    }
}

impl DisplayConfig {
    /// Apply `LBCERT_LOG_TIME`, `LBCERT_LOG_SOURCE` and `LBCERT_LOG_COLORS`
    pub(crate) fn apply_lookup<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LBCERT_LOG_TIME") {
            self.time = truthy(&v);
        }
        if let Some(v) = lookup("LBCERT_LOG_SOURCE") {
            self.source = truthy(&v);
        }
        if let Some(v) = lookup("LBCERT_LOG_COLORS") {
            self.colors = truthy(&v);
        }
    }
}

fn truthy(value: &str) -> bool {
    value != "0" && !value.eq_ignore_ascii_case("false")
}
