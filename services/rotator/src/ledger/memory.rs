//! In-memory ledger store for tests and dry runs.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ConvergenceLedger, LedgerError, LedgerStore};

/// Holds the serialized ledger document in memory.
///
/// The document is stored serialized so reads and writes go through the same
/// whole-document encoding as the durable stores.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    document: Mutex<Option<String>>,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `ledger`.
    pub fn with_ledger(ledger: &ConvergenceLedger) -> Result<Self, LedgerError> {
        Ok(Self {
            document: Mutex::new(Some(serde_json::to_string(ledger)?)),
            ..Self::default()
        })
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn read(&self) -> Result<ConvergenceLedger, LedgerError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("reads disabled".to_string()));
        }

        match self.document.lock().await.as_deref() {
            Some(doc) => Ok(serde_json::from_str(doc)?),
            None => Ok(ConvergenceLedger::new()),
        }
    }

    async fn write(&self, ledger: &ConvergenceLedger) -> Result<(), LedgerError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("writes disabled".to_string()));
        }

        let doc = serde_json::to_string(ledger)?;
        *self.document.lock().await = Some(doc);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_uninitialised_reads_empty() {
        let store = MemoryLedgerStore::new();
        assert!(store.read().await.unwrap().is_empty());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryLedgerStore::new();
        store.set_fail_writes(true);
        assert!(store.write(&ConvergenceLedger::new()).await.is_err());

        store.set_fail_writes(false);
        store.set_fail_reads(true);
        store.write(&ConvergenceLedger::new()).await.unwrap();
        assert!(store.read().await.is_err());
        assert_eq!(store.write_count(), 1);
    }
}
