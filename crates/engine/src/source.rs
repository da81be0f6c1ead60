//! Engine-facing traits consumed by the tracker and the health aggregator.
//!
//! [`EngineApi`] implements both; tests substitute scripted doubles.

use async_trait::async_trait;
use jobwatch_core::catalog::JobDefinition;
use jobwatch_core::execution::ExecutionRecord;

use crate::api::{EngineApi, EngineApiError};

/// Why a launch call did not return a 2xx acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LaunchError {
    /// The request never left this process (bad URL, connection refused).
    /// The engine cannot have started the job.
    #[error("Launch request was not sent: {0}")]
    NotSent(String),

    /// The request was sent but not acknowledged (error status, timeout,
    /// dropped response). The engine may still be running the job.
    #[error("Launch request was not acknowledged: {0}")]
    Unacknowledged(String),
}

impl LaunchError {
    /// `true` if the engine might have received the request.
    pub fn may_have_started(&self) -> bool {
        matches!(self, LaunchError::Unacknowledged(_))
    }
}

impl From<EngineApiError> for LaunchError {
    fn from(err: EngineApiError) -> Self {
        match &err {
            EngineApiError::Request(e) if e.is_builder() || e.is_connect() => {
                LaunchError::NotSent(err.to_string())
            }
            _ => LaunchError::Unacknowledged(err.to_string()),
        }
    }
}

/// Fires the one-shot "start this job" call.
#[async_trait]
pub trait JobLauncher: Send + Sync {
    async fn launch(
        &self,
        job: &JobDefinition,
        payload: &serde_json::Value,
    ) -> Result<(), LaunchError>;
}

/// Lists the most recent execution records.
///
/// `job_remote_id` is a filtering hint only; implementations may ignore it.
#[async_trait]
pub trait ExecutionSource: Send + Sync {
    async fn list_executions(
        &self,
        limit: usize,
        job_remote_id: Option<&str>,
    ) -> Result<Vec<ExecutionRecord>, EngineApiError>;
}

#[async_trait]
impl JobLauncher for EngineApi {
    async fn launch(
        &self,
        job: &JobDefinition,
        payload: &serde_json::Value,
    ) -> Result<(), LaunchError> {
        self.trigger(&job.launch_path, payload).await?;
        tracing::debug!(job_key = %job.key, "Engine acknowledged launch");
        Ok(())
    }
}

#[async_trait]
impl ExecutionSource for EngineApi {
    async fn list_executions(
        &self,
        limit: usize,
        job_remote_id: Option<&str>,
    ) -> Result<Vec<ExecutionRecord>, EngineApiError> {
        self.get_executions(limit, job_remote_id).await
    }
}
