//! Storage collaborators consumed by the worker.
//!
//! The worker only talks to these traits; the file-backed implementations
//! below mirror the on-disk layout of the API layer.

pub mod data;
pub mod locks;
pub mod logs;

pub use data::FileStore;
pub use locks::{KeyedGuard, KeyedLocks};
pub use logs::FileLogStore;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;

/// Reject keys that would escape the directory they are joined onto
fn file_key(key: &str) -> Result<&str, StoreError> {
    if key.is_empty() || key == "." || key == ".." || key.contains(['/', '\\', '\0']) {
        return Err(StoreError::InvalidKey(key.to_owned()));
    }
    Ok(key)
}

/// Record store, atomic at single-record granularity
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    /// Ids of every record in `category`
    async fn list(&self, category: &str) -> Result<Vec<String>, StoreError>;

    /// Read a raw record; `Ok(None)` when it does not exist
    async fn read(&self, category: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Replace an existing record. Concurrent updates are last-writer-wins.
    async fn update(&self, category: &str, id: &str, record: &Value) -> Result<(), StoreError>;
}

/// Append-only per-check logs and their archives
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append one line. The line is visible completely or not at all.
    async fn append(&self, log_id: &str, line: &str) -> Result<(), StoreError>;

    /// Ids of the live (not archived) logs
    async fn list_active(&self) -> Result<Vec<String>, StoreError>;

    /// Archive the current content of `log_id` under `archive_id`.
    ///
    /// Returns the number of lines archived. An empty log yields `Ok(0)` and
    /// no archive is written.
    async fn compress(&self, log_id: &str, archive_id: &str) -> Result<usize, StoreError>;

    /// Reset a live log to zero length
    async fn truncate(&self, log_id: &str) -> Result<(), StoreError>;
}
