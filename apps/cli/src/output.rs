//! Output rendering

use clap::ValueEnum;
use serde::Serialize;

/// How results are printed on stdout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// A single JSON document
    Json,
}

impl OutputFormat {
    /// Print `value`, using `text` for the human form
    pub(crate) fn print<T: Serialize>(self, value: &T, text: impl FnOnce() -> String) -> anyhow::Result<()> {
        match self {
            Self::Text => println!("{}", text()),
            Self::Json => println!("{}", serde_json::to_string_pretty(value)?),
        }
        Ok(())
    }
}
