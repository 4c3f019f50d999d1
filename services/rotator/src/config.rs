//! Rotator configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::ledger::LedgerLocation;
use crate::orchestrator::{RotationConfig, MIN_READY_POLL_INTERVAL};

const DEFAULT_LEDGER_PATH: &str = "/var/lib/rotor/ledger.json";

/// Rotator configuration (env-driven).
#[derive(Debug, Clone)]
pub struct Config {
    /// Name of the control-plane pool.
    pub control_plane_pool: String,

    /// Where the convergence ledger is stored.
    pub ledger: LedgerLocation,

    /// Upper bound on waiting for one node to become ready.
    pub ready_timeout: Duration,

    /// Interval between readiness probes.
    pub ready_poll_interval: Duration,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let control_plane_pool = std::env::var("ROTOR_CONTROL_PLANE_POOL")
            .unwrap_or_else(|_| "master".to_string());

        let ledger = match std::env::var("ROTOR_LEDGER_URL") {
            Ok(url) => LedgerLocation::Blob(url),
            Err(_) => LedgerLocation::File(
                std::env::var("ROTOR_LEDGER_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_LEDGER_PATH)),
            ),
        };

        let ready_timeout_secs: u64 = std::env::var("ROTOR_READY_TIMEOUT_SECS")
            .ok()
            .map(|v| v.parse())
            .transpose()
            .context("ROTOR_READY_TIMEOUT_SECS must be an integer (seconds).")?
            .unwrap_or(20 * 60);

        let ready_poll_interval_ms: u64 = std::env::var("ROTOR_READY_POLL_INTERVAL_MS")
            .ok()
            .map(|v| v.parse())
            .transpose()
            .context("ROTOR_READY_POLL_INTERVAL_MS must be an integer (milliseconds).")?
            .unwrap_or(5000);

        let log_level = std::env::var("ROTOR_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            control_plane_pool,
            ledger,
            ready_timeout: Duration::from_secs(ready_timeout_secs),
            ready_poll_interval: Duration::from_millis(ready_poll_interval_ms)
                .max(MIN_READY_POLL_INTERVAL),
            log_level,
        })
    }

    /// Orchestrator settings derived from this configuration.
    pub fn rotation(&self) -> RotationConfig {
        RotationConfig {
            ready_timeout: self.ready_timeout,
            ready_poll_interval: self.ready_poll_interval,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            control_plane_pool: "master".to_string(),
            ledger: LedgerLocation::File(PathBuf::from(DEFAULT_LEDGER_PATH)),
            ready_timeout: Duration::from_secs(20 * 60),
            ready_poll_interval: Duration::from_secs(5),
            log_level: "info".to_string(),
        }
    }
}
