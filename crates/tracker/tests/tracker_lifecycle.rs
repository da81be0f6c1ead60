//! Integration tests for a single tracker driven tick by tick.
//!
//! Time comes from a [`ManualClock`] and history from a scripted source, so
//! every test is deterministic.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::TimeZone;
use jobwatch_core::catalog::{JobCategory, JobDefinition};
use jobwatch_core::execution::{ExecutionRecord, ExecutionStatus};
use jobwatch_core::progress::{StepPlan, COMPLETE_PERCENT, DEFAULT_STEP_DURATION_MS};
use jobwatch_core::types::Timestamp;
use jobwatch_db::DbError;
use jobwatch_engine::{EngineApiError, ExecutionSource, JobLauncher, LaunchError};
use jobwatch_tracker::summary::{ResultSummary, ResultSummarySource};
use jobwatch_tracker::{
    ExecutionTracker, ManualClock, TimeWindowCorrelator, TimeoutPolicy, TrackerConfig,
    TrackerDriver, TrackerState,
};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

const LAUNCH_MS: i64 = 1_700_000_000_000;

fn at(offset_ms: i64) -> Timestamp {
    chrono::Utc.timestamp_millis_opt(LAUNCH_MS + offset_ms).unwrap()
}

/// Serves queued responses in order, then repeats the last one.
struct ScriptedSource {
    responses: Mutex<VecDeque<Result<Vec<ExecutionRecord>, u16>>>,
    last: Mutex<Result<Vec<ExecutionRecord>, u16>>,
    calls: Mutex<usize>,
}

impl ScriptedSource {
    fn new(responses: Vec<Result<Vec<ExecutionRecord>, u16>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            last: Mutex::new(Ok(Vec::new())),
            calls: Mutex::new(0),
        })
    }

    fn empty() -> Arc<Self> {
        Self::new(Vec::new())
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ExecutionSource for ScriptedSource {
    async fn list_executions(
        &self,
        _limit: usize,
        _job_remote_id: Option<&str>,
    ) -> Result<Vec<ExecutionRecord>, EngineApiError> {
        *self.calls.lock().unwrap() += 1;
        let next = self.responses.lock().unwrap().pop_front();
        let response = match next {
            Some(r) => {
                *self.last.lock().unwrap() = r.clone();
                r
            }
            None => self.last.lock().unwrap().clone(),
        };
        response.map_err(|status| EngineApiError::ApiError {
            status,
            body: "scripted failure".into(),
        })
    }
}

struct FixedLauncher(Result<(), LaunchError>);

#[async_trait]
impl JobLauncher for FixedLauncher {
    async fn launch(
        &self,
        _job: &JobDefinition,
        _payload: &serde_json::Value,
    ) -> Result<(), LaunchError> {
        self.0.clone()
    }
}

struct FixedSummary(Result<i64, ()>);

#[async_trait]
impl ResultSummarySource for FixedSummary {
    async fn summarize(
        &self,
        job: &JobDefinition,
        _since: Timestamp,
    ) -> Result<Option<ResultSummary>, DbError> {
        match self.0 {
            Ok(count) => Ok(job
                .result_table
                .as_deref()
                .map(|table| ResultSummary::new(table, count))),
            Err(()) => Err(DbError::Invalid(jobwatch_core::error::CoreError::Internal(
                "store offline".into(),
            ))),
        }
    }
}

fn job() -> JobDefinition {
    JobDefinition::new("keyword-scraper", "R1", "webhook/scrape", JobCategory::DataCollection)
        .with_result_table("keywords")
}

fn record(id: &str, started_offset_ms: i64, status: ExecutionStatus) -> ExecutionRecord {
    ExecutionRecord::new(id, "R1", status, at(started_offset_ms))
}

struct Harness {
    driver: TrackerDriver,
    clock: Arc<ManualClock>,
    source: Arc<ScriptedSource>,
}

fn harness(source: Arc<ScriptedSource>, config: TrackerConfig) -> Harness {
    let clock = Arc::new(ManualClock::new(at(0)));
    let correlator = Arc::new(TimeWindowCorrelator::new(
        source.clone(),
        config.correlation_window,
        config.correlation_slack_ms,
    ));
    let tracker = ExecutionTracker::new(
        job(),
        StepPlan::generic(config.step_duration_ms),
        &config,
    );
    Harness {
        driver: TrackerDriver::new(tracker, correlator, clock.clone()),
        clock,
        source,
    }
}

async fn launched(source: Arc<ScriptedSource>, config: TrackerConfig) -> Harness {
    let mut h = harness(source, config);
    h.driver
        .launch(&FixedLauncher(Ok(())), &serde_json::json!({}))
        .await;
    h
}

impl Harness {
    async fn tick_at(&mut self, offset_ms: i64) -> TrackerState {
        self.clock.set(at(offset_ms));
        self.driver.tick().await
    }
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn running_record_then_success_record() {
    let source = ScriptedSource::new(vec![
        Ok(vec![record("e1", 1_000, ExecutionStatus::Running)]),
        Ok(vec![record("e1", 1_000, ExecutionStatus::Success)]),
    ]);
    let mut h = launched(source, TrackerConfig::default()).await;

    assert_eq!(h.tick_at(1_500).await, TrackerState::Running);
    assert_eq!(h.tick_at(2_500).await, TrackerState::Running);
    assert_eq!(h.source.calls(), 0);

    // Third tick correlates and finds the job still running.
    assert_eq!(h.tick_at(3_500).await, TrackerState::Running);
    assert_eq!(h.source.calls(), 1);
    assert_eq!(h.driver.tracker().simulated_step_index(), 1);
    assert_eq!(h.driver.tracker().matched_execution_id(), Some("e1"));

    assert_eq!(h.tick_at(4_500).await, TrackerState::Running);
    assert_eq!(h.tick_at(5_500).await, TrackerState::Running);
    assert_eq!(h.tick_at(6_500).await, TrackerState::Succeeded);

    let tracker = h.driver.tracker();
    assert_eq!(tracker.simulated_progress(), COMPLETE_PERCENT);
    assert!(tracker.outcome_verified());
    assert_eq!(tracker.poll_count(), 6);
}

#[tokio::test]
async fn error_record_fails_tracker() {
    let source = ScriptedSource::new(vec![Ok(vec![record("e9", 200, ExecutionStatus::Error)])]);
    let mut h = launched(source, TrackerConfig::default()).await;

    for offset in [1_000, 2_000, 3_000] {
        h.tick_at(offset).await;
    }

    let view = h.driver.view();
    assert_eq!(view.state, TrackerState::Failed);
    assert_eq!(view.matched_execution_id.as_deref(), Some("e9"));
    assert!(view.last_error.is_some());
    assert!(view.progress_percent < COMPLETE_PERCENT);
}

#[tokio::test]
async fn cancelled_record_fails_before_ceiling() {
    let source =
        ScriptedSource::new(vec![Ok(vec![record("c1", 300, ExecutionStatus::Canceled)])]);
    let mut h = launched(source, TrackerConfig::default()).await;

    for offset in [1_000, 2_000, 3_000] {
        h.tick_at(offset).await;
    }

    let view = h.driver.view();
    assert_eq!(view.state, TrackerState::Failed);
    assert_eq!(view.matched_execution_id.as_deref(), Some("c1"));
    assert!(view.outcome_verified);
    assert_eq!(view.poll_count, 3);
}

// ---------------------------------------------------------------------------
// Correlation window boundary
// ---------------------------------------------------------------------------

#[tokio::test]
async fn record_exactly_at_slack_boundary_matches() {
    let source = ScriptedSource::new(vec![Ok(vec![record("edge", -5_000, ExecutionStatus::Success)])]);
    let mut h = launched(source, TrackerConfig::default()).await;

    for offset in [1_000, 2_000, 3_000] {
        h.tick_at(offset).await;
    }
    assert_eq!(h.driver.tracker().state(), TrackerState::Succeeded);
}

#[tokio::test]
async fn record_one_ms_outside_slack_is_ignored() {
    let source = ScriptedSource::new(vec![Ok(vec![record("early", -5_001, ExecutionStatus::Success)])]);
    let mut h = launched(source, TrackerConfig::default()).await;

    for offset in [1_000, 2_000, 3_000] {
        h.tick_at(offset).await;
    }
    assert_eq!(h.driver.tracker().state(), TrackerState::Running);
    assert!(h.driver.tracker().matched_execution_id().is_none());
}

// ---------------------------------------------------------------------------
// Timeout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn no_match_times_out_exactly_at_ceiling() {
    let mut h = launched(ScriptedSource::empty(), TrackerConfig::default()).await;

    for tick in 1..120 {
        let state = h.tick_at(tick * 1_000).await;
        assert_eq!(state, TrackerState::Running, "terminal too early at tick {tick}");
        assert!(h.driver.tracker().simulated_progress() < COMPLETE_PERCENT);
    }

    assert_eq!(h.tick_at(120_000).await, TrackerState::Succeeded);
    assert_eq!(h.driver.tracker().poll_count(), 120);
    assert!(!h.driver.tracker().outcome_verified());

    // Further ticks are inert.
    h.tick_at(121_000).await;
    assert_eq!(h.driver.tracker().poll_count(), 120);
}

#[tokio::test]
async fn strict_policy_reports_timed_out() {
    let config = TrackerConfig {
        poll_ceiling: 6,
        timeout_policy: TimeoutPolicy::ReportTimedOut,
        ..Default::default()
    };
    let mut h = launched(ScriptedSource::empty(), config).await;

    for tick in 1..=6 {
        h.tick_at(tick * 1_000).await;
    }
    assert_eq!(h.driver.tracker().state(), TrackerState::TimedOut);
}

#[tokio::test]
async fn unknown_job_uses_generic_steps_and_terminates() {
    let source = ScriptedSource::empty();
    let config = TrackerConfig::default();
    let clock = Arc::new(ManualClock::new(at(0)));
    let correlator = Arc::new(TimeWindowCorrelator::new(source, 10, 5_000));
    let steps = jobwatch_core::progress::StepTable::new(DEFAULT_STEP_DURATION_MS);
    let tracker = ExecutionTracker::new(job(), steps.plan_for("not-in-table"), &config);
    let mut driver = TrackerDriver::new(tracker, correlator, clock.clone());
    driver.launch(&FixedLauncher(Ok(())), &serde_json::json!({})).await;

    let mut previous = 0.0;
    let mut ticks = 0;
    while !driver.tracker().is_terminal() {
        ticks += 1;
        clock.set(at(ticks * 1_000));
        driver.tick().await;
        let progress = driver.tracker().simulated_progress();
        assert!(progress >= previous);
        previous = progress;
    }

    assert!(ticks <= 120);
    assert_eq!(driver.view().step_count, 3);
    assert_eq!(driver.view().step_label, "Finalizing");
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn correlation_failure_is_swallowed_and_retried() {
    let source = ScriptedSource::new(vec![
        Err(503),
        Ok(vec![record("e2", 100, ExecutionStatus::Success)]),
    ]);
    let mut h = launched(source, TrackerConfig::default()).await;

    for offset in [1_000, 2_000, 3_000] {
        h.tick_at(offset).await;
    }
    assert_eq!(h.driver.tracker().state(), TrackerState::Running);
    assert_eq!(h.driver.tracker().correlation_failures(), 1);
    let progress_after_failure = h.driver.tracker().simulated_progress();
    assert!(progress_after_failure > 0.0);

    for offset in [4_000, 5_000, 6_000] {
        h.tick_at(offset).await;
    }
    assert_eq!(h.driver.tracker().state(), TrackerState::Succeeded);
}

#[tokio::test]
async fn unsent_launch_is_fatal() {
    let mut h = harness(ScriptedSource::empty(), TrackerConfig::default());
    h.driver
        .launch(
            &FixedLauncher(Err(LaunchError::NotSent("connection refused".into()))),
            &serde_json::json!({}),
        )
        .await;

    assert_eq!(h.driver.tracker().state(), TrackerState::Failed);
    assert_eq!(h.tick_at(1_000).await, TrackerState::Failed);
    assert_eq!(h.source.calls(), 0);
}

#[tokio::test]
async fn unacknowledged_launch_still_polls() {
    let source = ScriptedSource::new(vec![Ok(vec![record("e3", 50, ExecutionStatus::Success)])]);
    let mut h = harness(source, TrackerConfig::default());
    h.driver
        .launch(
            &FixedLauncher(Err(LaunchError::Unacknowledged("504".into()))),
            &serde_json::json!({}),
        )
        .await;

    assert_eq!(h.driver.tracker().state(), TrackerState::Running);
    for offset in [1_000, 2_000, 3_000] {
        h.tick_at(offset).await;
    }
    assert_eq!(h.driver.tracker().state(), TrackerState::Succeeded);
    assert!(!h.driver.view().launch_acknowledged);
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_stops_all_mutation() {
    let source = ScriptedSource::new(vec![Ok(vec![record("e4", 0, ExecutionStatus::Success)])]);
    let mut h = launched(source, TrackerConfig::default()).await;

    h.tick_at(1_000).await;
    assert!(h.driver.cancel());
    let frozen = h.driver.view();
    assert_eq!(frozen.state, TrackerState::Cancelled);

    for tick in 2..=6 {
        h.tick_at(tick * 1_000).await;
    }
    assert_eq!(h.driver.view(), frozen);
    assert_eq!(h.source.calls(), 0);
}

// ---------------------------------------------------------------------------
// Result summary
// ---------------------------------------------------------------------------

#[tokio::test]
async fn success_attaches_result_summary() {
    let source = ScriptedSource::new(vec![Ok(vec![record("e5", 0, ExecutionStatus::Success)])]);
    let mut h = launched(source, TrackerConfig::default()).await;
    h.driver = h.driver.with_summaries(Arc::new(FixedSummary(Ok(42))));

    for offset in [1_000, 2_000, 3_000] {
        h.tick_at(offset).await;
    }

    let summary = h.driver.view().result_summary.unwrap();
    assert_eq!(summary.table, "keywords");
    assert_eq!(summary.new_records, 42);
}

#[tokio::test]
async fn summary_failure_keeps_success() {
    let source = ScriptedSource::new(vec![Ok(vec![record("e6", 0, ExecutionStatus::Success)])]);
    let mut h = launched(source, TrackerConfig::default()).await;
    h.driver = h.driver.with_summaries(Arc::new(FixedSummary(Err(()))));

    for offset in [1_000, 2_000, 3_000] {
        h.tick_at(offset).await;
    }

    let view = h.driver.view();
    assert_eq!(view.state, TrackerState::Succeeded);
    assert_matches!(view.result_summary, None);
}
