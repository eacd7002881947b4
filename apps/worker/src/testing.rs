//! In-memory collaborators shared by the unit tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::{NotifyError, StoreError};
use crate::monitoring::checker::Prober;
use crate::monitoring::types::{Check, Outcome};
use crate::notifier::Notifier;
use crate::storage::{LogStore, PersistenceStore};

pub const CHECK_ID: &str = "abcdefghij0123456789";

pub fn raw_check(id: &str) -> Value {
    json!({
        "id": id,
        "owner": "owner@example.com",
        "protocol": "http",
        "target": "example.com/health",
        "method": "get",
        "successCodes": [200],
        "timeoutSeconds": 2
    })
}

fn io_failure() -> StoreError {
    StoreError::Io(std::io::Error::other("injected failure"))
}

#[derive(Default)]
pub struct MemoryStore {
    pub records: Mutex<BTreeMap<(String, String), Value>>,
    pub updates: AtomicUsize,
    pub fail_updates: AtomicBool,
}

impl MemoryStore {
    pub fn insert(&self, category: &str, id: &str, record: Value) {
        self.records.lock().unwrap().insert((category.into(), id.into()), record);
    }

    pub fn get(&self, category: &str, id: &str) -> Option<Value> {
        self.records.lock().unwrap().get(&(category.into(), id.into())).cloned()
    }
}

#[async_trait]
impl PersistenceStore for MemoryStore {
    async fn list(&self, category: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .keys()
            .filter(|(c, _)| c == category)
            .map(|(_, id)| id.clone())
            .collect())
    }

    async fn read(&self, category: &str, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.get(category, id))
    }

    async fn update(&self, category: &str, id: &str, record: &Value) -> Result<(), StoreError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(io_failure());
        }
        let mut records = self.records.lock().unwrap();
        let slot = records
            .get_mut(&(category.into(), id.into()))
            .ok_or_else(|| StoreError::NotFound { category: category.into(), id: id.into() })?;
        *slot = record.clone();
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryLogStore {
    pub live: Mutex<BTreeMap<String, Vec<String>>>,
    pub archives: Mutex<BTreeMap<String, Vec<String>>>,
    pub fail_compress: Mutex<HashSet<String>>,
    pub fail_truncate: Mutex<HashSet<String>>,
}

impl MemoryLogStore {
    pub fn lines(&self, log_id: &str) -> Vec<String> {
        self.live.lock().unwrap().get(log_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn append(&self, log_id: &str, line: &str) -> Result<(), StoreError> {
        self.live.lock().unwrap().entry(log_id.into()).or_default().push(line.into());
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.live.lock().unwrap().keys().cloned().collect())
    }

    async fn compress(&self, log_id: &str, archive_id: &str) -> Result<usize, StoreError> {
        if self.fail_compress.lock().unwrap().contains(log_id) {
            return Err(io_failure());
        }
        let lines = self.lines(log_id);
        if lines.is_empty() {
            return Ok(0);
        }
        let count = lines.len();
        self.archives.lock().unwrap().insert(archive_id.into(), lines);
        Ok(count)
    }

    async fn truncate(&self, log_id: &str) -> Result<(), StoreError> {
        if self.fail_truncate.lock().unwrap().contains(log_id) {
            return Err(io_failure());
        }
        match self.live.lock().unwrap().get_mut(log_id) {
            Some(lines) => {
                lines.clear();
                Ok(())
            }
            None => Err(io_failure()),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, destination: &str, message: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((destination.into(), message.into()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Status(500));
        }
        Ok(())
    }
}

/// Prober returning a fixed outcome after an optional delay
pub struct StaticProber {
    pub outcome: Outcome,
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl StaticProber {
    pub fn new(outcome: Outcome) -> Self {
        Self { outcome, delay: Duration::ZERO, calls: AtomicUsize::new(0) }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for StaticProber {
    async fn probe(&self, _check: &Check) -> Outcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.outcome.clone()
    }
}
