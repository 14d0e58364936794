//! # lbcert-cli
//!
//! Command-line front end: every setting comes from a flag or from the
//! environment variable named in its help text.

#![forbid(unsafe_code)]

mod commands;
mod output;
mod settings;

use clap::{Parser, Subcommand};

pub use commands::{ListenersArgs, RotateArgs};
pub use output::OutputFormat;
pub use settings::CloudArgs;

/// Load balancer certificate rotation
#[derive(Parser, Debug)]
#[command(name = "lbcert", version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, value_enum, global = true, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Obtain a certificate, bind it to the listeners and delete the ones it replaces
    Rotate(RotateArgs),

    /// Show listeners and the certificates they serve
    Listeners(ListenersArgs),
}

impl Cli {
    /// Run the selected command
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Commands::Rotate(args) => commands::rotate::run(args, self.output).await,
            Commands::Listeners(args) => commands::listeners::run(args, self.output).await,
        }
    }
}
