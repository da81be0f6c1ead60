//! Integration tests for the health aggregator and monitor.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use jobwatch_core::catalog::{JobCatalog, JobCategory, JobDefinition, UNKNOWN_JOB_KEY};
use jobwatch_core::execution::{ExecutionRecord, ExecutionStatus};
use jobwatch_core::health::OverallStatus;
use jobwatch_core::types::Timestamp;
use jobwatch_engine::{EngineApiError, ExecutionSource};
use jobwatch_health::{HealthAggregator, HealthConfig, HealthError, HealthMonitor};
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

fn now() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
}

fn days_ago(days: i64) -> Timestamp {
    now() - chrono::Duration::days(days)
}

/// Answers the unfiltered window read from `window` and hinted reads from
/// `by_job`. Hinted reads also return a foreign record, as an engine that
/// ignores the filter would.
#[derive(Default)]
struct HistorySource {
    window: Vec<ExecutionRecord>,
    by_job: HashMap<String, Vec<ExecutionRecord>>,
    window_failures: AtomicUsize,
    failing_job: Option<String>,
    calls: Mutex<Vec<Option<String>>>,
}

#[async_trait]
impl ExecutionSource for HistorySource {
    async fn list_executions(
        &self,
        _limit: usize,
        job_remote_id: Option<&str>,
    ) -> Result<Vec<ExecutionRecord>, EngineApiError> {
        self.calls
            .lock()
            .unwrap()
            .push(job_remote_id.map(str::to_string));

        match job_remote_id {
            None => {
                let remaining = self.window_failures.load(Ordering::SeqCst);
                if remaining > 0 {
                    self.window_failures.store(remaining - 1, Ordering::SeqCst);
                    return Err(EngineApiError::ApiError {
                        status: 503,
                        body: "engine unavailable".into(),
                    });
                }
                Ok(self.window.clone())
            }
            Some(id) if self.failing_job.as_deref() == Some(id) => Err(EngineApiError::ApiError {
                status: 500,
                body: "lookup failed".into(),
            }),
            Some(id) => {
                let mut records = self.by_job.get(id).cloned().unwrap_or_default();
                records.push(ExecutionRecord::new(
                    "foreign",
                    "NOT-IN-CATALOG",
                    ExecutionStatus::Success,
                    days_ago(0),
                ));
                Ok(records)
            }
        }
    }
}

fn catalog() -> Arc<JobCatalog> {
    Arc::new(
        JobCatalog::new(vec![
            JobDefinition::new("orchestrator", "R1", "webhook/run", JobCategory::Orchestration),
            JobDefinition::new("newsletter", "R2", "webhook/news", JobCategory::Content),
            JobDefinition::new("archiver", "R3", "webhook/archive", JobCategory::Utility),
        ])
        .unwrap(),
    )
}

fn record(id: usize, remote: &str, status: ExecutionStatus, started_at: Timestamp) -> ExecutionRecord {
    ExecutionRecord::new(id.to_string(), remote, status, started_at)
}

fn aggregator(source: HistorySource) -> (HealthAggregator, Arc<HistorySource>) {
    let source = Arc::new(source);
    let aggregator = HealthAggregator::new(catalog(), source.clone(), HealthConfig::default());
    (aggregator, source)
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_history_is_trivially_healthy() {
    let (aggregator, _) = aggregator(HistorySource::default());
    let snapshot = aggregator.compute_snapshot(now()).await.unwrap();

    assert_eq!(snapshot.summary.total, 0);
    assert_eq!(snapshot.summary.success_rate_percent, 100.0);
    assert_eq!(snapshot.overall_status, OverallStatus::Healthy);
    assert_eq!(snapshot.never_executed.len(), 3);
    assert_eq!(snapshot.computed_at, now());
}

#[tokio::test]
async fn one_critical_error_outweighs_successes() {
    let mut window: Vec<_> = (0..99)
        .map(|i| record(i, "R2", ExecutionStatus::Success, days_ago(1)))
        .collect();
    window.push(record(99, "R1", ExecutionStatus::Error, days_ago(1)));

    let (aggregator, _) = aggregator(HistorySource {
        window,
        ..Default::default()
    });
    let snapshot = aggregator.compute_snapshot(now()).await.unwrap();

    assert_eq!(snapshot.overall_status, OverallStatus::Critical);
    assert_eq!(snapshot.summary.total, 100);
    assert_eq!(snapshot.summary.success_rate_percent, 99.0);
    assert_eq!(snapshot.errors.len(), 1);
    assert_eq!(snapshot.errors[0].job_key, "orchestrator");
    assert!(snapshot.errors[0].is_critical);
}

#[tokio::test]
async fn unknown_remote_error_is_a_warning() {
    let (aggregator, _) = aggregator(HistorySource {
        window: vec![record(1, "ZZZ", ExecutionStatus::Error, days_ago(1))],
        ..Default::default()
    });
    let snapshot = aggregator.compute_snapshot(now()).await.unwrap();

    assert_eq!(snapshot.overall_status, OverallStatus::Warning);
    assert_eq!(snapshot.errors[0].job_key, UNKNOWN_JOB_KEY);
    assert!(!snapshot.errors[0].is_critical);
}

#[tokio::test]
async fn never_executed_job_appears_nowhere_else() {
    let (aggregator, _) = aggregator(HistorySource {
        window: vec![
            record(1, "R1", ExecutionStatus::Success, days_ago(1)),
            record(2, "R2", ExecutionStatus::Success, days_ago(2)),
        ],
        ..Default::default()
    });
    let snapshot = aggregator.compute_snapshot(now()).await.unwrap();

    let never: Vec<_> = snapshot.never_executed.iter().map(|j| j.job_key.as_str()).collect();
    assert_eq!(never, vec!["archiver"]);
    assert!(snapshot.stale.iter().all(|j| j.job_key != "archiver"));
    assert!(snapshot.errors.iter().all(|e| e.job_remote_id != "R3"));
    assert!(!snapshot.per_job_stats.contains_key("R3"));
}

#[tokio::test]
async fn staleness_uses_per_job_lookup_beyond_window() {
    // R3 is absent from the window but has an old run in its own history.
    let mut by_job = HashMap::new();
    by_job.insert(
        "R3".to_string(),
        vec![record(50, "R3", ExecutionStatus::Success, days_ago(9))],
    );
    let (aggregator, source) = aggregator(HistorySource {
        window: vec![
            record(1, "R1", ExecutionStatus::Success, days_ago(1)),
            record(2, "R2", ExecutionStatus::Success, days_ago(1)),
        ],
        by_job,
        ..Default::default()
    });
    let snapshot = aggregator.compute_snapshot(now()).await.unwrap();

    assert!(snapshot.never_executed.is_empty());
    assert_eq!(snapshot.stale.len(), 1);
    assert_eq!(snapshot.stale[0].job_key, "archiver");
    assert_eq!(snapshot.stale[0].days_since_last_run, 9);

    let calls = source.calls.lock().unwrap();
    assert_eq!(calls.len(), 4);
    assert!(calls.contains(&None));
    assert!(calls.contains(&Some("R3".to_string())));
}

#[tokio::test]
async fn waiting_backlog_needs_attention() {
    let window = (0..4)
        .map(|i| record(i, "R1", ExecutionStatus::Waiting, days_ago(0)))
        .collect();
    let (aggregator, _) = aggregator(HistorySource {
        window,
        ..Default::default()
    });
    let snapshot = aggregator.compute_snapshot(now()).await.unwrap();
    assert_eq!(snapshot.overall_status, OverallStatus::Attention);
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn window_fetch_failure_is_explicit() {
    let (aggregator, _) = aggregator(HistorySource {
        window_failures: AtomicUsize::new(1),
        ..Default::default()
    });
    let err = aggregator.compute_snapshot(now()).await.unwrap_err();
    assert_matches!(err, HealthError::HistoryFetch(EngineApiError::ApiError { status: 503, .. }));
}

#[tokio::test]
async fn lookup_failure_does_not_fabricate_never_executed() {
    let (aggregator, _) = aggregator(HistorySource {
        failing_job: Some("R2".into()),
        ..Default::default()
    });
    let err = aggregator.compute_snapshot(now()).await.unwrap_err();
    assert_matches!(err, HealthError::StalenessLookup { ref job_key, .. } if job_key == "newsletter");
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_refresh_keeps_previous_snapshot() {
    let source = Arc::new(HistorySource {
        window: vec![record(1, "R1", ExecutionStatus::Success, Utc::now())],
        ..Default::default()
    });
    let monitor = HealthMonitor::new(HealthAggregator::new(
        catalog(),
        source.clone(),
        HealthConfig::default(),
    ));
    assert!(monitor.latest().await.is_none());

    let first = monitor.refresh_now().await.unwrap();
    assert!(monitor.last_failure().await.is_none());

    source.window_failures.store(1, Ordering::SeqCst);
    assert!(monitor.refresh_now().await.is_err());

    let kept = monitor.latest().await.unwrap();
    assert!(Arc::ptr_eq(&first, &kept));
    let failure = monitor.last_failure().await.unwrap();
    assert!(failure.message.contains("503"));

    let report = monitor.latest_report().await.unwrap();
    assert_eq!(report.total, 1);
}

#[tokio::test(start_paused = true)]
async fn loop_survives_a_failed_cycle() {
    let source = Arc::new(HistorySource {
        window_failures: AtomicUsize::new(1),
        ..Default::default()
    });
    let config = HealthConfig {
        interval: Duration::from_secs(60),
        ..Default::default()
    };
    let monitor = Arc::new(HealthMonitor::new(HealthAggregator::new(
        catalog(),
        source.clone(),
        config,
    )));

    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        let cancel = cancel.clone();
        async move { monitor.run(cancel).await }
    });

    // First cycle runs immediately and fails.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(monitor.latest().await.is_none());
    assert!(monitor.last_failure().await.is_some());

    // Second cycle succeeds.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(monitor.latest().await.is_some());
    assert!(monitor.last_failure().await.is_none());

    cancel.cancel();
    task.await.unwrap();
}

/// Window reads only; the first one takes `first_delay` of (paused) time.
struct SlowFirstSource {
    first_delay: Duration,
    calls: AtomicUsize,
}

#[async_trait]
impl ExecutionSource for SlowFirstSource {
    async fn list_executions(
        &self,
        _limit: usize,
        _job_remote_id: Option<&str>,
    ) -> Result<Vec<ExecutionRecord>, EngineApiError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(self.first_delay).await;
        }
        Ok(Vec::new())
    }
}

#[tokio::test(start_paused = true)]
async fn slow_cycle_delays_schedule_instead_of_bursting() {
    let source = Arc::new(SlowFirstSource {
        first_delay: Duration::from_secs(150),
        calls: AtomicUsize::new(0),
    });
    let config = HealthConfig {
        interval: Duration::from_secs(60),
        staleness_lookup_limit: 0,
        ..Default::default()
    };
    let monitor = Arc::new(HealthMonitor::new(HealthAggregator::new(
        catalog(),
        source.clone(),
        config,
    )));

    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        let cancel = cancel.clone();
        async move { monitor.run(cancel).await }
    });

    // The first cycle spans two missed ticks; only one catch-up cycle runs.
    tokio::time::sleep(Duration::from_secs(151)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);

    // The schedule restarts from the catch-up cycle.
    tokio::time::sleep(Duration::from_secs(50)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 3);

    cancel.cancel();
    task.await.unwrap();
}
