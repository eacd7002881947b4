//! End-to-end tests of the worker over the file stores
//!
//! These tests wire the real file-backed stores, the HTTP prober and a local
//! mock server together and drive them through the scheduler.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::{TempDir, tempdir};
use upcheck_worker::error::NotifyError;
use chrono::Utc;
use upcheck_worker::monitoring::validation::validate_check;
use upcheck_worker::monitoring::{
    CheckState, HttpProber, LogRecord, LogRotator, MonitoringScheduler, Outcome, OutcomeLogger,
    OutcomeProcessor, SchedulerConfig,
};
use upcheck_worker::notifier::Notifier;
use upcheck_worker::storage::{FileLogStore, FileStore, LogStore, PersistenceStore};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHECK_ID: &str = "q1w2e3r4t5y6u7i8o9p0";

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Notifier for Outbox {
    async fn send(&self, destination: &str, message: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((destination.to_string(), message.to_string()));
        Ok(())
    }
}

struct Worker {
    _dir: TempDir,
    store: Arc<FileStore>,
    logs: Arc<FileLogStore>,
    outbox: Arc<Outbox>,
    logger: Arc<OutcomeLogger>,
    rotator: Arc<LogRotator>,
    scheduler: Arc<MonitoringScheduler>,
}

fn worker() -> Worker {
    let _ = tracing_subscriber::fmt::try_init();

    let dir = tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path().join(".data")));
    let logs = Arc::new(FileLogStore::new(dir.path().join(".logs")));
    let outbox = Arc::new(Outbox::default());
    let logger = Arc::new(OutcomeLogger::new(logs.clone()));
    let processor =
        Arc::new(OutcomeProcessor::new(store.clone(), logger.clone(), outbox.clone(), "checks"));
    let rotator = Arc::new(LogRotator::new(logger.clone()));
    let scheduler = Arc::new(MonitoringScheduler::new(
        store.clone(),
        Arc::new(HttpProber::new().unwrap()),
        processor,
        rotator.clone(),
        SchedulerConfig::default(),
    ));

    Worker { _dir: dir, store, logs, outbox, logger, rotator, scheduler }
}

fn check_for(server: &MockServer, state: &str, last_checked: Option<i64>) -> Value {
    let mut check = json!({
        "id": CHECK_ID,
        "owner": "owner@example.com",
        "protocol": "http",
        "target": format!("{}/status", server.uri().trim_start_matches("http://")),
        "method": "get",
        "successCodes": [200],
        "timeoutSeconds": 1,
        "state": state
    });
    if let Some(millis) = last_checked {
        check["lastChecked"] = json!(millis);
    }
    check
}

fn log_records(text: &str) -> Vec<LogRecord> {
    text.lines().map(|line| serde_json::from_str(line).unwrap()).collect()
}

#[tokio::test]
async fn test_healthy_check_stays_up_without_alert() {
    let w = worker();
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).mount(&server).await;
    w.store.create("checks", CHECK_ID, &check_for(&server, "up", Some(1_000))).await.unwrap();

    w.scheduler.run_probe_cycle().await;

    let stored = w.store.read("checks", CHECK_ID).await.unwrap().unwrap();
    assert_eq!(stored["state"], "up");
    assert!(stored["lastChecked"].as_i64().unwrap() > 1_000);
    assert!(w.outbox.sent.lock().unwrap().is_empty());

    let records = log_records(&w.logs.read_live(CHECK_ID).await.unwrap());
    assert_eq!(records.len(), 1);
    assert!(!records[0].alert_triggered);
}

#[tokio::test]
async fn test_timeout_turns_check_down_and_alerts() {
    let w = worker();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;
    w.store.create("checks", CHECK_ID, &check_for(&server, "up", Some(1_000))).await.unwrap();

    w.scheduler.run_probe_cycle().await;

    let stored = w.store.read("checks", CHECK_ID).await.unwrap().unwrap();
    assert_eq!(stored["state"], "down");

    let sent = w.outbox.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    let (destination, message) = &sent[0];
    assert_eq!(destination, "owner@example.com");
    assert!(message.contains("GET"));
    assert!(message.contains("http://"));
    assert!(message.contains("/status"));
    assert!(message.ends_with("down"));
}

#[tokio::test]
async fn test_first_probe_of_a_failing_check_does_not_alert() {
    let w = worker();
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(500)).mount(&server).await;
    w.store.create("checks", CHECK_ID, &check_for(&server, "unknown", None)).await.unwrap();

    w.scheduler.run_probe_cycle().await;
    assert_eq!(w.store.read("checks", CHECK_ID).await.unwrap().unwrap()["state"], "down");
    assert!(w.outbox.sent.lock().unwrap().is_empty());

    // Recovery on the next cycle is a real transition
    server.reset().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).mount(&server).await;
    w.scheduler.run_probe_cycle().await;

    assert_eq!(w.store.read("checks", CHECK_ID).await.unwrap().unwrap()["state"], "up");
    assert_eq!(w.outbox.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_rotation_archives_and_restarts_the_log() {
    let w = worker();
    for n in 0..4 {
        w.logs.append(CHECK_ID, &json!({ "n": n }).to_string()).await.unwrap();
    }

    let report = w.rotator.rotate_all().await;
    assert_eq!(report.archived(), 1);

    let archives = w.logs.list_archives().await.unwrap();
    assert_eq!(archives.len(), 1);
    assert!(archives[0].starts_with(&format!("{CHECK_ID}-")));
    assert_eq!(w.logs.decompress(&archives[0]).await.unwrap().lines().count(), 4);
    assert_eq!(w.logs.read_live(CHECK_ID).await.unwrap(), "");

    w.logs.append(CHECK_ID, "{\"n\":99}").await.unwrap();
    assert_eq!(w.logs.read_live(CHECK_ID).await.unwrap(), "{\"n\":99}\n");
}

#[tokio::test]
async fn test_empty_log_is_left_alone() {
    let w = worker();
    w.logs.append(CHECK_ID, "line").await.unwrap();
    w.logs.truncate(CHECK_ID).await.unwrap();

    let report = w.rotator.rotate_all().await;

    assert_eq!(report.archived(), 0);
    assert_eq!(report.skipped(), 1);
    assert!(w.logs.list_archives().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_rotation_keeps_logs_apart() {
    let w = worker();
    let other = "z9x8c7v6b5n4m3l2k1j0";
    for n in 0..3 {
        w.logs.append(CHECK_ID, &format!("a{n}")).await.unwrap();
    }
    for n in 0..5 {
        w.logs.append(other, &format!("b{n}")).await.unwrap();
    }

    let report = w.rotator.rotate_all().await;
    assert_eq!(report.archived(), 2);
    assert!(report.failed.is_empty());

    for archive in w.logs.list_archives().await.unwrap() {
        let text = w.logs.decompress(&archive).await.unwrap();
        if archive.starts_with(CHECK_ID) {
            assert_eq!(text, "a0\na1\na2\n");
        } else {
            assert!(archive.starts_with(other));
            assert_eq!(text, "b0\nb1\nb2\nb3\nb4\n");
        }
    }
}

#[tokio::test]
async fn test_appends_racing_rotation_are_not_lost() {
    let w = worker();
    let server = MockServer::start().await;
    let check = validate_check(&check_for(&server, "up", Some(1_000))).unwrap();
    let record = |n: u16| LogRecord {
        check: check.clone(),
        outcome: Outcome::response(n),
        state: CheckState::Up,
        alert_triggered: false,
        time: Utc::now(),
    };
    w.logger.append(&record(0)).await.unwrap();

    let writer = {
        let logger = w.logger.clone();
        let records: Vec<_> = (1..=50).map(record).collect();
        tokio::spawn(async move {
            for record in &records {
                logger.append(record).await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };
    for _ in 0..5 {
        w.rotator.rotate_all().await;
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    writer.await.unwrap();

    let mut lines = w.logs.read_live(CHECK_ID).await.unwrap();
    for archive in w.logs.list_archives().await.unwrap() {
        lines.push_str(&w.logs.decompress(&archive).await.unwrap());
    }
    let mut codes: Vec<u16> =
        log_records(&lines).iter().filter_map(|record| record.outcome.response_code).collect();
    codes.sort_unstable();
    assert_eq!(codes, (0..=50).collect::<Vec<_>>());
}
