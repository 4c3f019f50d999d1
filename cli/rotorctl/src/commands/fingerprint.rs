//! Fingerprint command.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use rotor_rotator::hasher::{PoolHasher, ScaleSetHasher};
use serde::Serialize;

use super::CommandContext;
use crate::output::{print_single, OutputFormat};
use crate::pool_file::load_pool;

/// Print the fingerprint a rotation would record for this pool.
#[derive(Debug, Args)]
pub struct FingerprintCommand {
    /// Pool definition (.json or .toml).
    pool_file: PathBuf,
}

#[derive(Debug, Serialize)]
struct FingerprintOutput {
    pool: String,
    scale_set: String,
    fingerprint: String,
}

impl FingerprintCommand {
    pub fn run(self, ctx: &CommandContext) -> Result<()> {
        let pool = load_pool(&self.pool_file)?;
        let fingerprint = ScaleSetHasher.hash_pool(&pool)?;

        match ctx.format {
            OutputFormat::Table => println!("{fingerprint}"),
            OutputFormat::Json => print_single(&FingerprintOutput {
                scale_set: pool.scale_set_name(),
                pool: pool.name,
                fingerprint: fingerprint.to_hex(),
            }),
        }

        Ok(())
    }
}
