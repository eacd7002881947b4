use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{PersistenceStore, file_key};
use crate::error::StoreError;

const RECORD_EXTENSION: &str = "json";

/// JSON file per record, laid out as `<base_dir>/<category>/<id>.json`
#[derive(Debug)]
pub struct FileStore {
    base_dir: PathBuf,
    write_seq: AtomicU64,
}

impl FileStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into(), write_seq: AtomicU64::new(0) }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn record_path(&self, category: &str, id: &str) -> Result<PathBuf, StoreError> {
        Ok(self.category_dir(category)?.join(format!("{}.{RECORD_EXTENSION}", file_key(id)?)))
    }

    fn category_dir(&self, category: &str) -> Result<PathBuf, StoreError> {
        Ok(self.base_dir.join(file_key(category)?))
    }

    /// Store a new record, failing if one already exists under `id`
    pub async fn create(&self, category: &str, id: &str, record: &Value) -> Result<(), StoreError> {
        let path = self.record_path(category, id)?;
        fs::create_dir_all(self.category_dir(category)?).await?;

        let mut file = fs::OpenOptions::new().write(true).create_new(true).open(path).await?;
        file.write_all(&serde_json::to_vec(record)?).await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl PersistenceStore for FileStore {
    async fn list(&self, category: &str) -> Result<Vec<String>, StoreError> {
        let mut entries = match fs::read_dir(self.category_dir(category)?).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == RECORD_EXTENSION) {
                if let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) {
                    ids.push(id.to_owned());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn read(&self, category: &str, id: &str) -> Result<Option<Value>, StoreError> {
        match fs::read(self.record_path(category, id)?).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, category: &str, id: &str, record: &Value) -> Result<(), StoreError> {
        let path = self.record_path(category, id)?;
        if !fs::try_exists(&path).await? {
            return Err(StoreError::NotFound { category: category.to_owned(), id: id.to_owned() });
        }

        // Write beside the record and rename over it so readers never see a
        // half-written file.
        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let staging = path.with_extension(format!("{RECORD_EXTENSION}.{seq}.tmp"));

        let mut file = fs::File::create(&staging).await?;
        file.write_all(&serde_json::to_vec(record)?).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&staging, &path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }
        Ok(())
    }
}
