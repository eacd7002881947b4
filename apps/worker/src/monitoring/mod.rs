//! Check monitoring - the periodic probe pipeline
//!
//! This module is responsible for:
//! - Validating raw check records read from the store
//! - Probing HTTP/HTTPS targets under a hard timeout
//! - Deriving up/down state, persisting it and raising alerts
//! - Writing and rotating the per-check outcome logs

pub mod checker;
pub mod outcome_log;
pub mod processor;
pub mod rotation;
pub mod scheduler;
pub mod types;
pub mod validation;

pub use checker::{HttpProber, Prober};
pub use outcome_log::OutcomeLogger;
pub use processor::{Decision, OutcomeProcessor};
pub use rotation::{LogRotator, RotationReport};
pub use scheduler::{MonitoringScheduler, SchedulerConfig, SchedulerHandle};
pub use types::{Check, CheckState, LogRecord, Outcome};
