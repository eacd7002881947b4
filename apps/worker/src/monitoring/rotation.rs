//! Periodic archiving of per-check outcome logs.
//!
//! Every live log is compressed into an archive named
//! `<check id>-<rotation time in epoch millis>` and then truncated. Logs are
//! rotated concurrently and independently: one failing log is reported and
//! the rest still rotate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};

use super::outcome_log::OutcomeLogger;
use crate::error::RotationError;

/// Result of rotating a single log
#[derive(Debug)]
pub enum LogRotation {
    Archived { log_id: String, archive_id: String, lines: usize },
    /// The log had no lines, nothing was written
    Skipped { log_id: String },
}

/// Summary of one rotation pass
#[derive(Debug, Default)]
pub struct RotationReport {
    pub rotated: Vec<LogRotation>,
    pub failed: Vec<RotationError>,
}

impl RotationReport {
    pub fn archived(&self) -> usize {
        self.rotated.iter().filter(|r| matches!(r, LogRotation::Archived { .. })).count()
    }

    pub fn skipped(&self) -> usize {
        self.rotated.len() - self.archived()
    }
}

/// Archive id for `log_id` rotated at `at`
pub fn archive_id(log_id: &str, at: DateTime<Utc>) -> String {
    format!("{log_id}-{}", at.timestamp_millis())
}

pub struct LogRotator {
    logger: Arc<OutcomeLogger>,
}

impl LogRotator {
    pub fn new(logger: Arc<OutcomeLogger>) -> Self {
        Self { logger }
    }

    /// Rotate every live log once
    pub async fn rotate_all(&self) -> RotationReport {
        let log_ids = match self.logger.store().list_active().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "could not list logs to rotate");
                return RotationReport::default();
            }
        };

        if log_ids.is_empty() {
            debug!("no logs to rotate");
            return RotationReport::default();
        }

        let rotated_at = Utc::now();
        let results = join_all(log_ids.iter().map(|log_id| self.rotate(log_id, rotated_at))).await;

        let mut report = RotationReport::default();
        for result in results {
            match result {
                Ok(rotation) => report.rotated.push(rotation),
                Err(e) => {
                    warn!(log_id = e.log_id(), error = %e, "log rotation failed");
                    report.failed.push(e);
                }
            }
        }

        info!(
            archived = report.archived(),
            skipped = report.skipped(),
            failed = report.failed.len(),
            "log rotation finished"
        );
        report
    }

    /// Archive then truncate one log while holding off appends to it
    pub async fn rotate(
        &self,
        log_id: &str,
        rotated_at: DateTime<Utc>,
    ) -> Result<LogRotation, RotationError> {
        let _guard = self.logger.exclusive(log_id).await;
        let store = self.logger.store();
        let archive_id = archive_id(log_id, rotated_at);

        let lines = store
            .compress(log_id, &archive_id)
            .await
            .map_err(|source| RotationError::Compress { log_id: log_id.to_owned(), source })?;

        if lines == 0 {
            debug!(log_id, "log is empty, skipping rotation");
            return Ok(LogRotation::Skipped { log_id: log_id.to_owned() });
        }

        store
            .truncate(log_id)
            .await
            .map_err(|source| RotationError::Truncate { log_id: log_id.to_owned(), source })?;

        debug!(log_id, archive_id, lines, "log rotated");
        Ok(LogRotation::Archived { log_id: log_id.to_owned(), archive_id, lines })
    }
}
