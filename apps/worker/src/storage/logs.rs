use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{LogStore, file_key};
use crate::error::StoreError;

const LIVE_SUFFIX: &str = ".log";
const ARCHIVE_SUFFIX: &str = ".gz.b64";

/// Live logs as `<logs_dir>/<id>.log`, archives as `<logs_dir>/<archive>.gz.b64`
///
/// Archives hold the gzip-compressed log, base64 encoded.
#[derive(Debug)]
pub struct FileLogStore {
    logs_dir: PathBuf,
    write_seq: AtomicU64,
}

impl FileLogStore {
    pub fn new(logs_dir: impl Into<PathBuf>) -> Self {
        Self { logs_dir: logs_dir.into(), write_seq: AtomicU64::new(0) }
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    fn live_path(&self, log_id: &str) -> Result<PathBuf, StoreError> {
        Ok(self.logs_dir.join(format!("{}{LIVE_SUFFIX}", file_key(log_id)?)))
    }

    fn archive_path(&self, archive_id: &str) -> Result<PathBuf, StoreError> {
        Ok(self.logs_dir.join(format!("{}{ARCHIVE_SUFFIX}", file_key(archive_id)?)))
    }

    async fn list_with_suffix(&self, suffix: &str) -> Result<Vec<String>, StoreError> {
        let mut entries = match fs::read_dir(&self.logs_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(id) = entry.file_name().to_str().and_then(|name| name.strip_suffix(suffix))
            {
                ids.push(id.to_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Ids of every archive written so far
    pub async fn list_archives(&self) -> Result<Vec<String>, StoreError> {
        self.list_with_suffix(ARCHIVE_SUFFIX).await
    }

    /// Restore the text of an archive
    pub async fn decompress(&self, archive_id: &str) -> Result<String, StoreError> {
        let encoded = fs::read(self.archive_path(archive_id)?).await?;
        let compressed = STANDARD.decode(encoded)?;

        let mut text = String::new();
        GzDecoder::new(compressed.as_slice()).read_to_string(&mut text)?;
        Ok(text)
    }

    /// Read a live log; a missing log reads as empty
    pub async fn read_live(&self, log_id: &str) -> Result<String, StoreError> {
        match fs::read_to_string(self.live_path(log_id)?).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }
}

fn encode_archive(content: &[u8]) -> Result<String, StoreError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content)?;
    Ok(STANDARD.encode(encoder.finish()?))
}

/// Write `content` beside `target` and link it into place once it is on disk.
///
/// Linking fails if `target` already exists, so an archive is never replaced
/// and never observed half-written. The caller removes `staging`.
async fn publish(staging: &Path, content: &[u8], target: &Path) -> Result<(), StoreError> {
    let mut file = fs::File::create(staging).await?;
    file.write_all(content).await?;
    file.sync_all().await?;
    drop(file);

    fs::hard_link(staging, target).await?;
    Ok(())
}

#[async_trait]
impl LogStore for FileLogStore {
    async fn append(&self, log_id: &str, line: &str) -> Result<(), StoreError> {
        let path = self.live_path(log_id)?;
        fs::create_dir_all(&self.logs_dir).await?;

        // A single write of the whole line keeps readers from observing a
        // partial record.
        let mut buffer = String::with_capacity(line.len() + 1);
        buffer.push_str(line.trim_end_matches('\n'));
        buffer.push('\n');

        let mut file =
            fs::OpenOptions::new().create(true).append(true).open(path).await?;
        file.write_all(buffer.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<String>, StoreError> {
        self.list_with_suffix(LIVE_SUFFIX).await
    }

    async fn compress(&self, log_id: &str, archive_id: &str) -> Result<usize, StoreError> {
        let archive_path = self.archive_path(archive_id)?;
        let content = fs::read(self.live_path(log_id)?).await?;
        let lines = content.split(|byte| *byte == b'\n').filter(|line| !line.is_empty()).count();
        if lines == 0 {
            return Ok(0);
        }

        let encoded = tokio::task::spawn_blocking(move || encode_archive(&content))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))??;

        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let staging = self.logs_dir.join(format!("{archive_id}{ARCHIVE_SUFFIX}.{seq}.tmp"));
        let published = publish(&staging, encoded.as_bytes(), &archive_path).await;
        let _ = fs::remove_file(&staging).await;
        published?;
        Ok(lines)
    }

    async fn truncate(&self, log_id: &str) -> Result<(), StoreError> {
        let file = fs::OpenOptions::new().write(true).open(self.live_path(log_id)?).await?;
        file.set_len(0).await?;
        file.sync_all().await?;
        Ok(())
    }
}
