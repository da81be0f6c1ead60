//! State object for one in-flight launch.
//!
//! [`ExecutionTracker`] holds no timers and performs no I/O. A driver calls
//! [`begin_tick`](ExecutionTracker::begin_tick) once per timer tick, feeds
//! any correlation result back through
//! [`apply_correlation`](ExecutionTracker::apply_correlation), then calls
//! [`end_tick`](ExecutionTracker::end_tick) to enforce the poll ceiling.
//! Terminal states are final: every mutator is a no-op afterwards.

use jobwatch_core::catalog::JobDefinition;
use jobwatch_core::correlation::MatchOutcome;
use jobwatch_core::execution::ExecutionStatus;
use jobwatch_core::progress::{StepPlan, COMPLETE_PERCENT};
use jobwatch_core::types::{elapsed_ms, Timestamp};
use jobwatch_engine::LaunchError;
use serde::Serialize;

use crate::config::{TimeoutPolicy, TrackerConfig};
use crate::summary::ResultSummary;

/// Message recorded when the engine reports the matched execution failed.
/// The engine's error body is not parsed.
pub const REMOTE_FAILURE_MESSAGE: &str = "The job reported an error during execution";

/// Message recorded when the matched execution was cancelled on the engine.
pub const REMOTE_CANCELED_MESSAGE: &str = "The job was cancelled on the engine";

// ---------------------------------------------------------------------------
// TrackerState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerState {
    Launching,
    Running,
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl TrackerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerState::Launching => "launching",
            TrackerState::Running => "running",
            TrackerState::Succeeded => "succeeded",
            TrackerState::Failed => "failed",
            TrackerState::TimedOut => "timed_out",
            TrackerState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TrackerState::Launching | TrackerState::Running)
    }
}

// ---------------------------------------------------------------------------
// TickPlan
// ---------------------------------------------------------------------------

/// What the driver should do for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPlan {
    /// The tracker is not running; nothing to do.
    Idle,
    /// Progress was updated; no correlation this tick.
    Simulate,
    /// Progress was updated and a correlation read is due.
    Correlate { launched_at: Timestamp },
}

// ---------------------------------------------------------------------------
// TrackerView
// ---------------------------------------------------------------------------

/// Serialisable projection of a tracker for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerView {
    pub job_key: String,
    pub state: TrackerState,
    pub launched_at: Option<Timestamp>,
    pub step_label: String,
    pub step_index: usize,
    pub step_count: usize,
    pub progress_percent: f64,
    pub poll_count: u32,
    pub matched_execution_id: Option<String>,
    pub last_error: Option<String>,
    pub launch_acknowledged: bool,
    /// `false` when the terminal state was not confirmed by a matched record.
    pub outcome_verified: bool,
    pub result_summary: Option<ResultSummary>,
}

// ---------------------------------------------------------------------------
// ExecutionTracker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ExecutionTracker {
    job: JobDefinition,
    plan: StepPlan,
    poll_ceiling: u32,
    correlate_every: u32,
    timeout_policy: TimeoutPolicy,

    state: TrackerState,
    launched_at: Option<Timestamp>,
    simulated_step_index: usize,
    simulated_progress: f64,
    matched_execution_id: Option<String>,
    poll_count: u32,
    last_error: Option<String>,
    launch_acknowledged: bool,
    outcome_verified: bool,
    correlation_failures: u32,
    result_summary: Option<ResultSummary>,
}

impl ExecutionTracker {
    /// Create a tracker in `Launching`.
    pub fn new(job: JobDefinition, plan: StepPlan, config: &TrackerConfig) -> Self {
        Self {
            job,
            plan,
            poll_ceiling: config.poll_ceiling.max(1),
            correlate_every: config.correlate_every.max(1),
            timeout_policy: config.timeout_policy,
            state: TrackerState::Launching,
            launched_at: None,
            simulated_step_index: 0,
            simulated_progress: 0.0,
            matched_execution_id: None,
            poll_count: 0,
            last_error: None,
            launch_acknowledged: false,
            outcome_verified: false,
            correlation_failures: 0,
            result_summary: None,
        }
    }

    // ---- accessors ----

    pub fn job(&self) -> &JobDefinition {
        &self.job
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn launched_at(&self) -> Option<Timestamp> {
        self.launched_at
    }

    pub fn simulated_step_index(&self) -> usize {
        self.simulated_step_index
    }

    pub fn simulated_progress(&self) -> f64 {
        self.simulated_progress
    }

    pub fn matched_execution_id(&self) -> Option<&str> {
        self.matched_execution_id.as_deref()
    }

    pub fn poll_count(&self) -> u32 {
        self.poll_count
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn outcome_verified(&self) -> bool {
        self.outcome_verified
    }

    pub fn correlation_failures(&self) -> u32 {
        self.correlation_failures
    }

    pub fn result_summary(&self) -> Option<&ResultSummary> {
        self.result_summary.as_ref()
    }

    // ---- transitions ----

    /// Record the outcome of the launch call.
    ///
    /// A request that never left the process is fatal. Anything else,
    /// including an unacknowledged request, moves to `Running` with
    /// `launched_at = now` because the engine may have started the job.
    pub fn record_launch(&mut self, now: Timestamp, result: Result<(), LaunchError>) {
        if self.state != TrackerState::Launching {
            return;
        }
        match result {
            Ok(()) => {
                self.launch_acknowledged = true;
                self.enter_running(now);
            }
            Err(err) if err.may_have_started() => {
                self.launch_acknowledged = false;
                self.enter_running(now);
            }
            Err(err) => {
                self.state = TrackerState::Failed;
                self.last_error = Some(err.to_string());
                self.outcome_verified = true;
            }
        }
    }

    fn enter_running(&mut self, now: Timestamp) {
        self.state = TrackerState::Running;
        self.launched_at = Some(now);
    }

    /// Count a tick and refresh simulated progress.
    ///
    /// Returns [`TickPlan::Correlate`] on every `correlate_every`-th tick.
    pub fn begin_tick(&mut self, now: Timestamp) -> TickPlan {
        let launched_at = match (self.state, self.launched_at) {
            (TrackerState::Running, Some(at)) => at,
            _ => return TickPlan::Idle,
        };

        self.poll_count += 1;

        let elapsed = elapsed_ms(launched_at, now);
        self.simulated_step_index = self
            .simulated_step_index
            .max(self.plan.step_index(elapsed));
        self.simulated_progress = self.simulated_progress.max(self.plan.percent(elapsed));

        if self.poll_count % self.correlate_every == 0 {
            TickPlan::Correlate { launched_at }
        } else {
            TickPlan::Simulate
        }
    }

    /// Apply a correlation result. Only terminal statuses on a matched
    /// record change state.
    pub fn apply_correlation(&mut self, outcome: &MatchOutcome) {
        if self.state != TrackerState::Running {
            return;
        }
        let record = match outcome {
            MatchOutcome::Matched(record) => record,
            MatchOutcome::Unmatched => return,
        };

        match record.status {
            ExecutionStatus::Success => {
                self.state = TrackerState::Succeeded;
                self.simulated_progress = COMPLETE_PERCENT;
                self.simulated_step_index = self.plan.step_count() - 1;
                self.matched_execution_id = Some(record.id.clone());
                self.outcome_verified = true;
            }
            ExecutionStatus::Error => {
                self.state = TrackerState::Failed;
                self.last_error = Some(REMOTE_FAILURE_MESSAGE.to_string());
                self.matched_execution_id = Some(record.id.clone());
                self.outcome_verified = true;
            }
            ExecutionStatus::Canceled => {
                self.state = TrackerState::Failed;
                self.last_error = Some(REMOTE_CANCELED_MESSAGE.to_string());
                self.matched_execution_id = Some(record.id.clone());
                self.outcome_verified = true;
            }
            // Still in flight, or unknown.
            _ => {
                self.matched_execution_id = Some(record.id.clone());
            }
        }
    }

    /// Note a failed correlation read. Progress simulation continues.
    pub fn record_correlation_failure(&mut self) {
        if self.state == TrackerState::Running {
            self.correlation_failures += 1;
        }
    }

    /// Enforce the poll ceiling after any correlation for this tick has
    /// settled. Returns `true` if the tracker timed out on this call.
    pub fn end_tick(&mut self) -> bool {
        if self.state != TrackerState::Running || self.poll_count < self.poll_ceiling {
            return false;
        }
        self.outcome_verified = false;
        match self.timeout_policy {
            TimeoutPolicy::AssumeSucceeded => {
                self.state = TrackerState::Succeeded;
                self.simulated_progress = COMPLETE_PERCENT;
                self.simulated_step_index = self.plan.step_count() - 1;
            }
            TimeoutPolicy::ReportTimedOut => {
                self.state = TrackerState::TimedOut;
            }
        }
        true
    }

    /// Stop tracking. Returns `false` if the tracker was already terminal,
    /// in which case its outcome is kept.
    pub fn cancel(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.state = TrackerState::Cancelled;
        true
    }

    /// Attach the best-effort result summary fetched after success.
    pub fn attach_result_summary(&mut self, summary: ResultSummary) {
        if self.state == TrackerState::Succeeded {
            self.result_summary = Some(summary);
        }
    }

    pub fn view(&self) -> TrackerView {
        TrackerView {
            job_key: self.job.key.clone(),
            state: self.state,
            launched_at: self.launched_at,
            step_label: self.plan.label(self.simulated_step_index).to_string(),
            step_index: self.simulated_step_index,
            step_count: self.plan.step_count(),
            progress_percent: self.simulated_progress,
            poll_count: self.poll_count,
            matched_execution_id: self.matched_execution_id.clone(),
            last_error: self.last_error.clone(),
            launch_acknowledged: self.launch_acknowledged,
            outcome_verified: self.outcome_verified,
            result_summary: self.result_summary.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
