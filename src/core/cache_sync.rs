//! DurableCacheSync - best-effort mirror of merged records
//!
//! Inserts each record the store does not already hold, then issues one
//! flush per non-empty batch. Storage errors are logged and swallowed; the
//! in-memory buffer stays authoritative.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::adapters::traits::DurableStore;
use crate::core::types::DomainRecord;

/// What one `persist` call did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistOutcome {
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub flushed: bool,
}

#[derive(Clone)]
pub struct DurableCacheSync {
    store: Arc<dyn DurableStore>,
}

impl DurableCacheSync {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store }
    }

    /// Mirror `records` into durable storage; never fails
    pub async fn persist(&self, records: &[DomainRecord]) -> PersistOutcome {
        let mut outcome = PersistOutcome::default();
        if records.is_empty() {
            return outcome;
        }

        for record in records {
            match self.store.exists(record.id).await {
                Ok(true) => {
                    outcome.skipped += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    // Unknown presence: insert anyway, the store is insert-if-absent.
                    warn!(id = record.id, error = %e, "Cache existence check failed");
                }
            }

            match self.store.insert(record).await {
                Ok(()) => outcome.inserted += 1,
                Err(e) => {
                    outcome.failed += 1;
                    warn!(id = record.id, error = %e, "Cache insert failed");
                }
            }
        }

        if outcome.inserted > 0 {
            match self.store.flush().await {
                Ok(()) => outcome.flushed = true,
                Err(e) => warn!(error = %e, inserted = outcome.inserted, "Cache flush failed"),
            }
        }

        debug!(
            inserted = outcome.inserted,
            skipped = outcome.skipped,
            failed = outcome.failed,
            flushed = outcome.flushed,
            "Cache sync batch"
        );
        outcome
    }

    /// Cold-start population, newest first; empty on storage failure
    pub async fn load_recent(&self, limit: usize) -> Vec<DomainRecord> {
        match self.store.load_recent(limit).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Cache read failed, starting empty");
                Vec::new()
            }
        }
    }
}
