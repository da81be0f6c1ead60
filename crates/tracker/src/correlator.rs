//! Correlation read against the engine's execution list.

use std::sync::Arc;

use async_trait::async_trait;
use jobwatch_core::catalog::JobDefinition;
use jobwatch_core::correlation::{correlate, MatchOutcome};
use jobwatch_core::types::Timestamp;
use jobwatch_engine::{EngineApiError, ExecutionSource};

/// Finds the execution record belonging to a launch.
#[async_trait]
pub trait Correlator: Send + Sync {
    async fn correlate(
        &self,
        job: &JobDefinition,
        launched_at: Timestamp,
    ) -> Result<MatchOutcome, EngineApiError>;
}

/// Fetches the newest `window` records and matches them on remote id and
/// start time.
pub struct TimeWindowCorrelator {
    source: Arc<dyn ExecutionSource>,
    window: usize,
    slack_ms: i64,
}

impl TimeWindowCorrelator {
    pub fn new(source: Arc<dyn ExecutionSource>, window: usize, slack_ms: i64) -> Self {
        Self {
            source,
            window,
            slack_ms,
        }
    }
}

#[async_trait]
impl Correlator for TimeWindowCorrelator {
    async fn correlate(
        &self,
        job: &JobDefinition,
        launched_at: Timestamp,
    ) -> Result<MatchOutcome, EngineApiError> {
        let records = self
            .source
            .list_executions(self.window, Some(&job.remote_id))
            .await?;

        let outcome = correlate(&records, &job.remote_id, launched_at, self.slack_ms);
        tracing::debug!(
            job_key = %job.key,
            fetched = records.len(),
            matched = outcome.record().map(|r| r.id.as_str()).unwrap_or("-"),
            "Correlation read",
        );
        Ok(outcome)
    }
}
