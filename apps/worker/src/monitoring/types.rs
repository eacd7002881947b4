use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Length of every check id handed out by the API layer
pub const CHECK_ID_LEN: usize = 20;

/// Availability state of a check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    #[default]
    Unknown,
    Up,
    Down,
}

impl std::fmt::Display for CheckState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckState::Up => write!(f, "up"),
            CheckState::Down => write!(f, "down"),
            CheckState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Scheme used to reach a check target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "http" => Some(Protocol::Http),
            "https" => Some(Protocol::Https),
            _ => None,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP method a check is probed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Put => "put",
            Method::Post => "post",
            Method::Delete => "delete",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "get" => Some(Method::Get),
            "put" => Some(Method::Put),
            "post" => Some(Method::Post),
            "delete" => Some(Method::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A fully validated check record
///
/// Field names on disk follow the camelCase layout written by the API layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    pub id: String,

    /// Account that created the check
    pub owner: String,

    pub protocol: Protocol,

    /// Host plus path and query, without the scheme
    pub target: String,

    pub method: Method,

    pub success_codes: BTreeSet<u16>,

    pub timeout_seconds: u64,

    #[serde(default)]
    pub state: CheckState,

    /// Completion time of the most recent probe
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_checked: Option<DateTime<Utc>>,

    /// Where alerts go; the owner is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_phone: Option<String>,

    /// The stored record this check was validated from
    #[serde(skip)]
    pub source: Map<String, Value>,
}

impl Check {
    /// Full URL the prober requests
    pub fn url(&self) -> String {
        format!("{}://{}", self.protocol, self.target)
    }

    /// Destination handed to the notifier
    pub fn alert_destination(&self) -> &str {
        self.user_phone.as_deref().unwrap_or(&self.owner)
    }

    /// Record to write back to the store
    ///
    /// Only `state` and `lastChecked` are replaced in the stored record; every
    /// other key keeps the name and value it was read with. A check built
    /// without a source record is serialized whole.
    pub fn to_record(&self) -> serde_json::Result<Value> {
        if self.source.is_empty() {
            return serde_json::to_value(self);
        }

        let mut record = self.source.clone();
        record.insert("state".into(), serde_json::to_value(self.state)?);
        record.insert(
            "lastChecked".into(),
            self.last_checked.map_or(Value::Null, |at| Value::from(at.timestamp_millis())),
        );
        Ok(Value::Object(record))
    }
}

/// Terminal result of a single probe
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    /// Transport failure or timeout descriptor
    pub transport_error: Option<String>,

    /// Status code of the response, if one arrived
    pub response_code: Option<u16>,
}

impl Outcome {
    pub fn response(code: u16) -> Self {
        Self { transport_error: None, response_code: Some(code) }
    }

    pub fn transport_error(error: impl Into<String>) -> Self {
        Self { transport_error: Some(error.into()), response_code: None }
    }
}

/// One immutable line of a check's outcome log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    /// The check as it was probed, before the new state was applied
    pub check: Check,
    pub outcome: Outcome,
    pub state: CheckState,
    pub alert_triggered: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,
}
