//! CLI commands.

mod fingerprint;
mod ledger;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rotor_rotator::Config;

use crate::output::OutputFormat;

/// rotorctl - inspect node pool convergence.
#[derive(Debug, Parser)]
#[command(name = "rotorctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (table or json).
    #[arg(long, global = true, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compute the configuration fingerprint of a pool file.
    Fingerprint(fingerprint::FingerprintCommand),

    /// Inspect or edit the convergence ledger.
    Ledger(ledger::LedgerCommand),
}

/// Shared state handed to every command.
pub struct CommandContext {
    pub config: Config,
    pub format: OutputFormat,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self, config: Config) -> Result<()> {
        let ctx = CommandContext {
            config,
            format: OutputFormat::parse(&self.format),
        };

        match self.command {
            Commands::Fingerprint(cmd) => cmd.run(&ctx),
            Commands::Ledger(cmd) => cmd.run(&ctx).await,
        }
    }
}
