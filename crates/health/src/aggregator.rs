//! Full-recompute health snapshot over the engine's execution history.

use std::sync::Arc;

use futures::future::try_join_all;
use jobwatch_core::catalog::JobCatalog;
use jobwatch_core::execution::ExecutionRecord;
use jobwatch_core::health::{build_snapshot, HealthSnapshot};
use jobwatch_core::types::Timestamp;
use jobwatch_engine::{EngineApiError, ExecutionSource};

use crate::config::HealthConfig;

/// Why a snapshot could not be computed.
///
/// A failed read never degrades into an empty, healthy-looking snapshot.
#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("Execution history fetch failed: {0}")]
    HistoryFetch(#[from] EngineApiError),

    #[error("Staleness lookup for job '{job_key}' failed: {source}")]
    StalenessLookup {
        job_key: String,
        #[source]
        source: EngineApiError,
    },
}

pub struct HealthAggregator {
    catalog: Arc<JobCatalog>,
    source: Arc<dyn ExecutionSource>,
    config: HealthConfig,
}

impl HealthAggregator {
    pub fn new(
        catalog: Arc<JobCatalog>,
        source: Arc<dyn ExecutionSource>,
        config: HealthConfig,
    ) -> Self {
        Self {
            catalog,
            source,
            config,
        }
    }

    pub fn catalog(&self) -> &JobCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Fetch the history window plus one lookup per catalog entry and build
    /// a snapshot as of `now`.
    pub async fn compute_snapshot(&self, now: Timestamp) -> Result<HealthSnapshot, HealthError> {
        let window = self
            .source
            .list_executions(self.config.history_window, None)
            .await?;

        let evidence = self.staleness_evidence().await?;

        let snapshot = build_snapshot(
            &self.catalog,
            &window,
            &evidence,
            now,
            self.config.stale_after(),
        );

        tracing::info!(
            overall_status = snapshot.overall_status.as_str(),
            total = snapshot.summary.total,
            errors = snapshot.errors.len(),
            never_executed = snapshot.never_executed.len(),
            stale = snapshot.stale.len(),
            "Health snapshot computed",
        );
        Ok(snapshot)
    }

    /// Newest records per catalog entry, read with the remote id hint and
    /// filtered again here since the engine may ignore the hint. A limit of
    /// zero skips the lookups and leaves the window as the only evidence.
    async fn staleness_evidence(&self) -> Result<Vec<ExecutionRecord>, HealthError> {
        let limit = self.config.staleness_lookup_limit;
        if limit == 0 {
            return Ok(Vec::new());
        }
        let lookups = self.catalog.iter().map(|job| async move {
            let records = self
                .source
                .list_executions(limit, Some(&job.remote_id))
                .await
                .map_err(|source| HealthError::StalenessLookup {
                    job_key: job.key.clone(),
                    source,
                })?;
            Ok::<_, HealthError>(
                records
                    .into_iter()
                    .filter(|r| r.job_remote_id == job.remote_id)
                    .collect::<Vec<_>>(),
            )
        });

        let per_job = try_join_all(lookups).await?;
        Ok(per_job.into_iter().flatten().collect())
    }
}
