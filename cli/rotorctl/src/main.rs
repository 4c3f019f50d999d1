//! rotorctl - operator tool for node pool rotation.
//!
//! Inspects and edits the convergence ledger and computes pool
//! fingerprints. Rotation itself is driven by the controller embedding
//! `rotor-rotator`.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod error;
mod output;
mod pool_file;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = rotor_rotator::Config::from_env()?;

    // Prefer RUST_LOG, fall back to ROTOR_LOG_LEVEL. Logs go to stderr so
    // command output stays machine-readable.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    if let Err(e) = cli.run(config).await {
        error::print_error(&e);
        std::process::exit(1);
    }

    Ok(())
}
