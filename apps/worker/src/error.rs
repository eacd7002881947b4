use std::io::Error as IoError;

use thiserror::Error;

/// A raw check record could not be turned into a [`Check`](crate::monitoring::types::Check)
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("check record is not a JSON object")]
    NotAnObject,

    #[error("required field `{0}` is missing")]
    MissingField(&'static str),

    #[error("field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// A probe ended without a response
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid probe url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{0}")]
    Transport(String),

    #[error("timeout")]
    Timeout,
}

/// Failures of the persistence and log stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{category}/{id} does not exist")]
    NotFound { category: String, id: String },

    #[error("{0:?} cannot be used as a file name")]
    InvalidKey(String),

    #[error("{0:#}")]
    Io(#[from] IoError),

    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("archive is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// Failures delivering an alert
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("given parameters were missing or invalid")]
    InvalidParameters,

    #[error("alert request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("status code returned was {0}")]
    Status(u16),
}

/// Rotation of one log failed; other logs are unaffected
#[derive(Debug, Error)]
pub enum RotationError {
    #[error("compressing log {log_id} failed: {source}")]
    Compress {
        log_id: String,
        #[source]
        source: StoreError,
    },

    #[error("truncating log {log_id} failed: {source}")]
    Truncate {
        log_id: String,
        #[source]
        source: StoreError,
    },
}

impl RotationError {
    pub fn log_id(&self) -> &str {
        match self {
            RotationError::Compress { log_id, .. } | RotationError::Truncate { log_id, .. } => {
                log_id
            }
        }
    }
}
