//! Check-monitoring worker: periodically probes configured endpoints,
//! tracks their up/down state, alerts owners on transitions and keeps a
//! rotating per-check outcome log.

pub mod config;
pub mod error;
pub mod monitoring;
pub mod notifier;
pub mod storage;

#[cfg(test)]
mod testing;
