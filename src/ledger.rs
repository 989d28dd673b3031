use tokio::sync::Mutex;

use crate::types::{FailedRecord, Recipient};

#[cfg(feature = "metrics")]
fn metric_add(name: &'static str, value: u64) {
    metrics::counter!(name, value);
}

#[cfg(not(feature = "metrics"))]
fn metric_add(_name: &'static str, _value: u64) {}

/// In-memory record of failed dispatches, kept for inspection and retry.
///
/// Created once per process and shared by handle. Contents are lost on
/// restart. Records are only ever appended in bulk or cleared in bulk.
#[derive(Debug, Default)]
pub struct FailureLedger {
    records: Mutex<Vec<FailedRecord>>,
}

impl FailureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_all(&self, records: Vec<FailedRecord>) {
        if records.is_empty() {
            return;
        }
        let added = records.len();
        let mut guard = self.records.lock().await;
        guard.extend(records);
        metric_add("sms.ledger.recorded", added as u64);
        tracing::info!(added, total = guard.len(), "recorded failed dispatches");
    }

    /// Snapshot in insertion order.
    pub async fn get_all(&self) -> Vec<FailedRecord> {
        self.records.lock().await.clone()
    }

    pub async fn get_targets(&self) -> Vec<Recipient> {
        let guard = self.records.lock().await;
        guard.iter().map(|r| r.recipient.clone()).collect()
    }

    pub async fn count(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Empty the ledger, returning how many records were removed.
    pub async fn clear(&self) -> usize {
        let removed = {
            let mut guard = self.records.lock().await;
            let removed = guard.len();
            guard.clear();
            removed
        };
        tracing::info!(removed, "cleared failure ledger");
        removed
    }

    /// Take every target and clear the ledger under a single lock.
    ///
    /// Concurrent retries each see a disjoint set of targets.
    pub async fn drain_targets(&self) -> Vec<Recipient> {
        let drained: Vec<FailedRecord> = {
            let mut guard = self.records.lock().await;
            std::mem::take(&mut *guard)
        };
        if !drained.is_empty() {
            tracing::info!(removed = drained.len(), "cleared failure ledger for retry");
        }
        drained.into_iter().map(|r| r.recipient).collect()
    }
}
