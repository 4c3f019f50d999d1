//! Ledger document in object storage.
//!
//! The blob URL is expected to carry its own authorisation (for example a
//! SAS token), so requests are plain GET/PUT.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, error};

use super::{ConvergenceLedger, LedgerError, LedgerStore};

/// JSON ledger blob addressed by URL.
#[derive(Debug, Clone)]
pub struct BlobLedgerStore {
    client: reqwest::Client,
    url: String,
}

impl BlobLedgerStore {
    pub fn new(url: String) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl LedgerStore for BlobLedgerStore {
    async fn read(&self) -> Result<ConvergenceLedger, LedgerError> {
        let response = self.client.get(&self.url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Ledger blob does not exist yet, starting empty");
            return Ok(ConvergenceLedger::new());
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Failed to read ledger blob");
            return Err(LedgerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let ledger: ConvergenceLedger = serde_json::from_slice(&bytes)?;
        debug!(entries = ledger.len(), "Loaded ledger blob");
        Ok(ledger)
    }

    async fn write(&self, ledger: &ConvergenceLedger) -> Result<(), LedgerError> {
        let body = serde_json::to_vec(ledger)?;
        let response = self
            .client
            .put(&self.url)
            .header("x-ms-blob-type", "BlockBlob")
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Failed to write ledger blob");
            return Err(LedgerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!(entries = ledger.len(), "Saved ledger blob");
        Ok(())
    }
}
