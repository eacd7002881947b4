use std::sync::Arc;

use super::types::LogRecord;
use crate::error::StoreError;
use crate::storage::{KeyedGuard, KeyedLocks, LogStore};

/// Writes outcome records to the per-check log
///
/// Appends for one check are serialized, and [`OutcomeLogger::exclusive`]
/// lets rotation hold off appends while it archives and truncates a log.
pub struct OutcomeLogger {
    store: Arc<dyn LogStore>,
    locks: KeyedLocks,
}

impl OutcomeLogger {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self { store, locks: KeyedLocks::new() }
    }

    pub fn store(&self) -> &Arc<dyn LogStore> {
        &self.store
    }

    /// Append `record` as one JSON line to the log named after its check
    pub async fn append(&self, record: &LogRecord) -> Result<(), StoreError> {
        let line = serde_json::to_string(record)?;
        let _guard = self.locks.lock(&record.check.id).await;
        self.store.append(&record.check.id, &line).await
    }

    /// Exclusive access to `log_id` until the guard is dropped
    pub async fn exclusive(&self, log_id: &str) -> KeyedGuard<'_> {
        self.locks.lock(log_id).await
    }
}
