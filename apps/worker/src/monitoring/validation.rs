//! Sanity checking of raw check records read from the store.
//!
//! Records may be missing fields, carry legacy keys (`email`, `url`), or have
//! values of the wrong type. Required fields are coerced where that is
//! unambiguous and rejected otherwise; the optional bookkeeping fields written
//! by this worker (`state`, `lastChecked`) fall back to their defaults.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::types::{CHECK_ID_LEN, Check, CheckState, Method, Protocol};
use crate::error::ValidationError;

const MIN_TIMEOUT_SECONDS: u64 = 1;
const MAX_TIMEOUT_SECONDS: u64 = 5;

/// Validate a raw record and produce a typed [`Check`]
pub fn validate_check(raw: &Value) -> Result<Check, ValidationError> {
    let record = raw.as_object().ok_or(ValidationError::NotAnObject)?;

    let id = required_string(record, &["id"], "id")?;
    if id.len() != CHECK_ID_LEN
        || !id.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
    {
        return Err(invalid("id", format!("expected {CHECK_ID_LEN} characters of [a-z0-9]")));
    }

    let owner = required_string(record, &["owner", "email"], "owner")?;

    let protocol = required_string(record, &["protocol"], "protocol")?;
    let protocol = Protocol::parse(&protocol.to_ascii_lowercase())
        .ok_or_else(|| invalid("protocol", format!("unsupported protocol {protocol:?}")))?;

    let target = required_string(record, &["target", "url"], "target")?;

    let method = required_string(record, &["method"], "method")?;
    let method = Method::parse(&method.to_ascii_lowercase())
        .ok_or_else(|| invalid("method", format!("unsupported method {method:?}")))?;

    let success_codes = validate_success_codes(record.get("successCodes"))?;
    let timeout_seconds = validate_timeout(record.get("timeoutSeconds"))?;

    Ok(Check {
        id,
        owner,
        protocol,
        target,
        method,
        success_codes,
        timeout_seconds,
        state: coerce_state(record.get("state")),
        last_checked: coerce_last_checked(record.get("lastChecked")),
        user_phone: record
            .get("userPhone")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|phone| !phone.is_empty())
            .map(str::to_owned),
        source: record.clone(),
    })
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidField { field, reason: reason.into() }
}

/// First non-empty trimmed string found under any of `keys`
fn required_string(
    record: &Map<String, Value>,
    keys: &[&str],
    field: &'static str,
) -> Result<String, ValidationError> {
    let value = keys
        .iter()
        .find_map(|key| record.get(*key).filter(|value| !value.is_null()))
        .ok_or(ValidationError::MissingField(field))?;

    let text = value.as_str().ok_or_else(|| invalid(field, "expected a string"))?.trim();
    if text.is_empty() {
        return Err(invalid(field, "must not be empty"));
    }

    Ok(text.to_owned())
}

/// Integral JSON number, accepting `2.0` as well as `2`
fn as_integer(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|number| number.fract() == 0.0 && *number >= 0.0 && *number <= u64::MAX as f64)
            .map(|number| number as u64)
    })
}

/// Status codes a check accepts as healthy
///
/// Every element must be an integral HTTP status code in 100..=599; one
/// element outside that range rejects the whole record.
fn validate_success_codes(value: Option<&Value>) -> Result<BTreeSet<u16>, ValidationError> {
    let codes = value
        .filter(|value| !value.is_null())
        .ok_or(ValidationError::MissingField("successCodes"))?
        .as_array()
        .ok_or_else(|| invalid("successCodes", "expected an array"))?;

    if codes.is_empty() {
        return Err(invalid("successCodes", "must not be empty"));
    }

    codes
        .iter()
        .map(|code| {
            as_integer(code)
                .filter(|code| (100..=599).contains(code))
                .map(|code| code as u16)
                .ok_or_else(|| invalid("successCodes", format!("{code} is not a status code")))
        })
        .collect()
}

fn validate_timeout(value: Option<&Value>) -> Result<u64, ValidationError> {
    let value = value
        .filter(|value| !value.is_null())
        .ok_or(ValidationError::MissingField("timeoutSeconds"))?;

    as_integer(value)
        .filter(|seconds| (MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS).contains(seconds))
        .ok_or_else(|| {
            invalid(
                "timeoutSeconds",
                format!(
                    "{value} is not a whole number between {MIN_TIMEOUT_SECONDS} and \
                     {MAX_TIMEOUT_SECONDS}"
                ),
            )
        })
}

fn coerce_state(value: Option<&Value>) -> CheckState {
    match value.and_then(Value::as_str) {
        Some("up") => CheckState::Up,
        Some("down") => CheckState::Down,
        _ => CheckState::Unknown,
    }
}

fn coerce_last_checked(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(as_integer)
        .filter(|millis| *millis > 0)
        .and_then(|millis| i64::try_from(millis).ok())
        .and_then(DateTime::from_timestamp_millis)
}
