use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::outcome_log::OutcomeLogger;
use super::types::{Check, CheckState, LogRecord, Outcome};
use crate::error::StoreError;
use crate::notifier::Notifier;
use crate::storage::PersistenceStore;

/// What the processor decided for one probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub state: CheckState,
    pub alert_triggered: bool,
}

/// `up` only when a response arrived and its code is one of the check's
/// success codes
pub fn derive_state(check: &Check, outcome: &Outcome) -> CheckState {
    match (&outcome.transport_error, outcome.response_code) {
        (None, Some(code)) if check.success_codes.contains(&code) => CheckState::Up,
        _ => CheckState::Down,
    }
}

/// A check that has never completed a probe does not alert
pub fn alert_warranted(check: &Check, new_state: CheckState) -> bool {
    check.last_checked.is_some() && check.state != new_state
}

/// Alert text for a check that now has `state`
pub fn alert_message(check: &Check, state: CheckState) -> String {
    format!(
        "Alert! Your check for {} {} is currently {}",
        check.method.as_str().to_uppercase(),
        check.url(),
        state
    )
}

/// Turns probe outcomes into state updates, log records and alerts
pub struct OutcomeProcessor {
    store: Arc<dyn PersistenceStore>,
    logger: Arc<OutcomeLogger>,
    notifier: Arc<dyn Notifier>,
    category: String,
}

impl OutcomeProcessor {
    pub fn new(
        store: Arc<dyn PersistenceStore>,
        logger: Arc<OutcomeLogger>,
        notifier: Arc<dyn Notifier>,
        category: impl Into<String>,
    ) -> Self {
        Self { store, logger, notifier, category: category.into() }
    }

    /// Apply `outcome` to `check`.
    ///
    /// The updated record is always written. Logging and alerting only happen
    /// once that write succeeded; their failures are logged and swallowed.
    pub async fn process(&self, check: Check, outcome: Outcome) -> Result<Decision, StoreError> {
        let state = derive_state(&check, &outcome);
        let alert_triggered = alert_warranted(&check, state);
        let now = Utc::now();

        let mut updated = check.clone();
        updated.state = state;
        updated.last_checked = Some(now);

        let record = updated.to_record()?;
        if let Err(e) = self.store.update(&self.category, &check.id, &record).await {
            warn!(check_id = %check.id, error = %e, "failed to save check outcome");
            return Err(e);
        }

        let log_record = LogRecord { check, outcome, state, alert_triggered, time: now };
        match self.logger.append(&log_record).await {
            Ok(()) => debug!(check_id = %updated.id, "logged check outcome"),
            Err(e) => warn!(check_id = %updated.id, error = %e, "failed to log check outcome"),
        }

        if alert_triggered {
            let message = alert_message(&updated, state);
            match self.notifier.send(updated.alert_destination(), &message).await {
                Ok(()) => info!(check_id = %updated.id, %state, "owner alerted to state change"),
                Err(e) => warn!(check_id = %updated.id, error = %e, "failed to send alert"),
            }
        } else {
            debug!(check_id = %updated.id, %state, "check outcome has not changed, no alert needed");
        }

        Ok(Decision { state, alert_triggered })
    }
}
