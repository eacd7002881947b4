use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use super::checker::Prober;
use super::processor::OutcomeProcessor;
use super::rotation::LogRotator;
use super::validation::validate_check;
use crate::storage::PersistenceStore;

/// Timing and behaviour of the two periodic cycles
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub check_interval: Duration,
    pub rotation_interval: Duration,
    /// Store category holding the check records
    pub category: String,
    /// Skip a check while an earlier probe of it is still running
    pub guard_in_flight: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            rotation_interval: Duration::from_secs(24 * 3600),
            category: "checks".into(),
            guard_in_flight: false,
        }
    }
}

/// Ids of checks with a probe currently running
#[derive(Debug, Default)]
struct InFlight {
    ids: Mutex<HashSet<String>>,
}

/// Releases an [`InFlight`] claim when the probe task ends or is aborted
struct InFlightClaim {
    owner: Arc<InFlight>,
    id: String,
}

impl InFlight {
    fn claim(self: &Arc<Self>, id: &str) -> Option<InFlightClaim> {
        let mut ids = self.ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        ids.insert(id.to_owned())
            .then(|| InFlightClaim { owner: Arc::clone(self), id: id.to_owned() })
    }
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        let mut ids = self.owner.ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        ids.remove(&self.id);
    }
}

/// Read, validate, probe and process one check
struct Pipeline {
    store: Arc<dyn PersistenceStore>,
    prober: Arc<dyn Prober>,
    processor: Arc<OutcomeProcessor>,
    category: String,
    in_flight: Option<Arc<InFlight>>,
}

impl Pipeline {
    async fn run(&self, id: String) {
        let _claim = match &self.in_flight {
            Some(in_flight) => match in_flight.claim(&id) {
                Some(claim) => Some(claim),
                None => {
                    debug!(check_id = %id, "previous probe still running, skipping");
                    return;
                }
            },
            None => None,
        };

        let raw = match self.store.read(&self.category, &id).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(check_id = %id, "check disappeared before it could be read");
                return;
            }
            Err(e) => {
                warn!(check_id = %id, error = %e, "error reading check data");
                return;
            }
        };

        let check = match validate_check(&raw) {
            Ok(check) => check,
            Err(e) => {
                debug!(check_id = %id, error = %e, "check is not properly formatted, skipping it");
                return;
            }
        };

        if check.id != id {
            debug!(check_id = %id, record_id = %check.id, "check record is stored under another id, skipping it");
            return;
        }

        let outcome = self.prober.probe(&check).await;

        // Errors are already logged by the processor; the next tick re-reads
        // the record and tries again.
        let _ = self.processor.process(check, outcome).await;
    }
}

/// Drives the probe cycle and the log rotation cycle
///
/// Each probe tick lists every check and spawns one task per check without
/// waiting for the previous tick's tasks. Unless `guard_in_flight` is set, a
/// slow probe can therefore overlap with the next tick's probe of the same
/// check, and both may report the same transition.
pub struct MonitoringScheduler {
    pipeline: Arc<Pipeline>,
    rotator: Arc<LogRotator>,
    config: SchedulerConfig,
}

impl MonitoringScheduler {
    pub fn new(
        store: Arc<dyn PersistenceStore>,
        prober: Arc<dyn Prober>,
        processor: Arc<OutcomeProcessor>,
        rotator: Arc<LogRotator>,
        config: SchedulerConfig,
    ) -> Self {
        let pipeline = Pipeline {
            store,
            prober,
            processor,
            category: config.category.clone(),
            in_flight: config.guard_in_flight.then(Arc::default),
        };

        Self { pipeline: Arc::new(pipeline), rotator, config }
    }

    /// List every check and spawn its probe onto `tasks`.
    ///
    /// Returns the number of probes spawned.
    pub async fn spawn_probe_cycle(&self, tasks: &mut JoinSet<()>) -> usize {
        let ids = match self.pipeline.store.list(&self.config.category).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "could not list checks");
                return 0;
            }
        };

        if ids.is_empty() {
            debug!("could not find any checks to process");
            return 0;
        }

        let spawned = ids.len();
        for id in ids {
            let pipeline = Arc::clone(&self.pipeline);
            tasks.spawn(async move { pipeline.run(id).await });
        }
        spawned
    }

    /// Run one probe cycle and wait for all of its probes
    pub async fn run_probe_cycle(&self) -> usize {
        let mut tasks = JoinSet::new();
        let spawned = self.spawn_probe_cycle(&mut tasks).await;
        while let Some(result) = tasks.join_next().await {
            log_task_failure(result);
        }
        spawned
    }

    /// Start both periodic cycles; each runs once immediately
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        info!(
            check_interval = ?self.config.check_interval,
            rotation_interval = ?self.config.rotation_interval,
            "background workers are running"
        );

        let probes = {
            let scheduler = Arc::clone(&self);
            tokio::spawn(async move {
                let mut timer = interval(scheduler.config.check_interval);
                timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

                // Dropping this set when the loop is aborted aborts every
                // probe still in flight.
                let mut tasks = JoinSet::new();
                loop {
                    timer.tick().await;
                    while let Some(result) = tasks.try_join_next() {
                        log_task_failure(result);
                    }
                    let spawned = scheduler.spawn_probe_cycle(&mut tasks).await;
                    debug!(spawned, in_flight = tasks.len(), "probe cycle started");
                }
            })
        };

        let rotation = {
            let rotator = Arc::clone(&self.rotator);
            let period = self.config.rotation_interval;
            tokio::spawn(async move {
                let mut timer = interval(period);
                timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    timer.tick().await;
                    rotator.rotate_all().await;
                }
            })
        };

        SchedulerHandle { probes, rotation }
    }
}

fn log_task_failure(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            error!(error = %e, "probe task panicked");
        }
    }
}

/// Running cycles of a started [`MonitoringScheduler`]
pub struct SchedulerHandle {
    probes: JoinHandle<()>,
    rotation: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop both cycles and abandon in-flight probes
    pub async fn shutdown(self) {
        self.probes.abort();
        self.rotation.abort();
        let _ = self.probes.await;
        let _ = self.rotation.await;
        info!("background workers stopped");
    }
}
