use std::time::Duration;

use jobwatch_core::correlation::DEFAULT_CORRELATION_SLACK_MS;
use jobwatch_core::error::CoreError;
use jobwatch_core::progress::DEFAULT_STEP_DURATION_MS;
use serde::Serialize;

/// Default interval between ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Ticks without a terminal correlation before the timeout policy applies.
pub const DEFAULT_POLL_CEILING: u32 = 120;

/// Correlation runs on every Nth tick.
pub const DEFAULT_CORRELATE_EVERY: u32 = 3;

/// Records fetched per correlation attempt.
pub const DEFAULT_CORRELATION_WINDOW: usize = 10;

/// What a tracker reports when the poll ceiling is reached without a
/// matched terminal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Report `Succeeded` (unverified) with full progress.
    #[default]
    AssumeSucceeded,
    /// Report the distinct `TimedOut` terminal state.
    ReportTimedOut,
}

impl TimeoutPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeoutPolicy::AssumeSucceeded => "assume_succeeded",
            TimeoutPolicy::ReportTimedOut => "report_timed_out",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "assume_succeeded" => Ok(TimeoutPolicy::AssumeSucceeded),
            "report_timed_out" => Ok(TimeoutPolicy::ReportTimedOut),
            other => Err(CoreError::Config(format!(
                "Unknown timeout policy '{other}' (expected assume_succeeded or report_timed_out)"
            ))),
        }
    }
}

/// Tunables shared by every tracker a manager creates.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    pub tick_interval: Duration,
    pub poll_ceiling: u32,
    pub correlate_every: u32,
    pub correlation_window: usize,
    pub correlation_slack_ms: i64,
    pub step_duration_ms: i64,
    pub timeout_policy: TimeoutPolicy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            poll_ceiling: DEFAULT_POLL_CEILING,
            correlate_every: DEFAULT_CORRELATE_EVERY,
            correlation_window: DEFAULT_CORRELATION_WINDOW,
            correlation_slack_ms: DEFAULT_CORRELATION_SLACK_MS,
            step_duration_ms: DEFAULT_STEP_DURATION_MS,
            timeout_policy: TimeoutPolicy::default(),
        }
    }
}

impl TrackerConfig {
    /// Reject values that would stall or never time out.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.tick_interval.is_zero() {
            return Err(CoreError::Config("Tick interval must be positive".into()));
        }
        if self.poll_ceiling == 0 {
            return Err(CoreError::Config("Poll ceiling must be at least 1".into()));
        }
        if self.correlate_every == 0 {
            return Err(CoreError::Config(
                "Correlation frequency must be at least 1".into(),
            ));
        }
        if self.correlation_window == 0 {
            return Err(CoreError::Config(
                "Correlation window must be at least 1".into(),
            ));
        }
        if self.correlation_slack_ms < 0 {
            return Err(CoreError::Config(
                "Correlation slack must not be negative".into(),
            ));
        }
        Ok(())
    }
}
