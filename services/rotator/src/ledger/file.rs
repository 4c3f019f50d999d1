//! Ledger document on local disk.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::{ConvergenceLedger, LedgerError, LedgerStore};

/// JSON ledger file, replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct FileLedgerStore {
    path: PathBuf,
}

impl FileLedgerStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl LedgerStore for FileLedgerStore {
    async fn read(&self) -> Result<ConvergenceLedger, LedgerError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No ledger file, starting empty");
                return Ok(ConvergenceLedger::new());
            }
            Err(e) => return Err(e.into()),
        };

        let ledger: ConvergenceLedger = serde_json::from_str(&content)?;
        debug!(
            path = %self.path.display(),
            entries = ledger.len(),
            "Loaded ledger"
        );
        Ok(ledger)
    }

    async fn write(&self, ledger: &ConvergenceLedger) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let tmp_path = self.path.with_extension("tmp");
        let content = serde_json::to_string_pretty(ledger)?;
        fs::write(&tmp_path, content).await?;
        fs::rename(&tmp_path, &self.path).await?;

        debug!(
            path = %self.path.display(),
            entries = ledger.len(),
            "Saved ledger"
        );
        Ok(())
    }
}
