//! Time-window correlation between a launch and the engine's execution list.
//!
//! The engine returns no execution handle at launch time, so a launch is
//! joined to a record on `(remote id, started_at >= launched_at - slack)`.
//! The slack absorbs clock skew between this process and the engine.

use chrono::Duration;
use serde::Serialize;

use crate::execution::ExecutionRecord;
use crate::types::Timestamp;

/// Default tolerance for records that appear to start before the launch.
pub const DEFAULT_CORRELATION_SLACK_MS: i64 = 5_000;

/// Result of one correlation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "record", rename_all = "snake_case")]
pub enum MatchOutcome {
    Matched(ExecutionRecord),
    Unmatched,
}

impl MatchOutcome {
    pub fn record(&self) -> Option<&ExecutionRecord> {
        match self {
            MatchOutcome::Matched(record) => Some(record),
            MatchOutcome::Unmatched => None,
        }
    }
}

/// Earliest `started_at` a record may have and still belong to a launch.
pub fn window_start(launched_at: Timestamp, slack_ms: i64) -> Timestamp {
    launched_at - Duration::milliseconds(slack_ms)
}

/// Pick the most recent record for `remote_id` that started inside the
/// window. The boundary is inclusive. Ties keep the first record seen.
/// Records without a start time never match.
pub fn select_match<'a>(
    records: &'a [ExecutionRecord],
    remote_id: &str,
    launched_at: Timestamp,
    slack_ms: i64,
) -> Option<&'a ExecutionRecord> {
    let earliest = window_start(launched_at, slack_ms);
    records
        .iter()
        .filter(|r| {
            r.job_remote_id == remote_id && r.started_at.is_some_and(|t| t >= earliest)
        })
        .fold(None, |best: Option<&ExecutionRecord>, r| match best {
            Some(b) if b.started_at >= r.started_at => Some(b),
            _ => Some(r),
        })
}

/// Owned variant of [`select_match`].
pub fn correlate(
    records: &[ExecutionRecord],
    remote_id: &str,
    launched_at: Timestamp,
    slack_ms: i64,
) -> MatchOutcome {
    match select_match(records, remote_id, launched_at, slack_ms) {
        Some(record) => MatchOutcome::Matched(record.clone()),
        None => MatchOutcome::Unmatched,
    }
}
