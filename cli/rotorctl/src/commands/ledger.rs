//! Ledger commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use rotor_rotator::{ledger, reset_pool_convergence, ConvergenceLedger};
use serde::Serialize;
use tabled::Tabled;
use tracing::info;

use super::CommandContext;
use crate::output::{print_output, print_success};

#[derive(Debug, Args)]
pub struct LedgerCommand {
    #[command(subcommand)]
    command: LedgerCommands,
}

#[derive(Debug, Subcommand)]
enum LedgerCommands {
    /// Show every recorded node and its fingerprint.
    Show,

    /// Forget the convergence of one pool so its nodes rotate again.
    ResetPool(ResetPoolArgs),
}

#[derive(Debug, Args)]
struct ResetPoolArgs {
    /// Pool to reset (defaults to the control-plane pool).
    #[arg(long)]
    pool: Option<String>,
}

#[derive(Debug, Serialize, Tabled)]
struct LedgerRow {
    #[tabled(rename = "NODE")]
    node: String,
    #[tabled(rename = "FINGERPRINT")]
    fingerprint: String,
}

fn rows(ledger: &ConvergenceLedger) -> Vec<LedgerRow> {
    ledger
        .iter()
        .map(|(node, fingerprint)| LedgerRow {
            node: node.to_string(),
            fingerprint: fingerprint.to_hex(),
        })
        .collect()
}

impl LedgerCommand {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        let store = ledger::open(&ctx.config.ledger).context("failed to open ledger store")?;

        match self.command {
            LedgerCommands::Show => {
                let ledger = store.read().await.context("failed to read ledger")?;
                print_output(&rows(&ledger), ctx.format);
            }
            LedgerCommands::ResetPool(args) => {
                let pool = args
                    .pool
                    .unwrap_or_else(|| ctx.config.control_plane_pool.clone());
                info!(pool = %pool, location = ?ctx.config.ledger, "Resetting pool convergence");

                let removed = reset_pool_convergence(store.as_ref(), &pool).await?;
                print_success(&format!("Removed {removed} ledger entries for pool {pool}"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rotor_rotator::{Fingerprint, NodeIdentity};

    #[test]
    fn test_rows_follow_identity_order() {
        let fp = Fingerprint::from_bytes([0xab; 32]);
        let ledger: ConvergenceLedger = [
            (NodeIdentity::new("master-000001"), fp),
            (NodeIdentity::new("infra-000000"), fp),
        ]
        .into_iter()
        .collect();

        let rows = rows(&ledger);
        assert_eq!(rows[0].node, "infra-000000");
        assert_eq!(rows[1].node, "master-000001");
        assert_eq!(rows[1].fingerprint, "ab".repeat(32));
    }
}
