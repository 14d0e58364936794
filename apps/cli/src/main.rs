//! lbcert binary
//!
//! Rotates the TLS certificate of an OCI load balancer.

use anyhow::Context;
use clap::Parser;

use lbcert_cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // reqwest and instant-acme each bring a rustls provider; pick one for the process.
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }

    let _guard = lbcert_log::auto_init().context("failed to initialize logging")?;

    let cli = Cli::parse();
    let result = cli.run().await;
    if let Err(error) = &result {
        tracing::error!(error = format!("{error:#}"), "lbcert failed");
    }
    result
}
