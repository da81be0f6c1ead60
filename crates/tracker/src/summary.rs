//! Best-effort "what did the job produce" lookup after a confirmed success.

use async_trait::async_trait;
use jobwatch_core::catalog::JobDefinition;
use jobwatch_core::types::Timestamp;
use jobwatch_db::repositories::ResultCountRepo;
use jobwatch_db::{DbError, DbPool};
use serde::Serialize;

/// Rows a finished job wrote into its result table since launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultSummary {
    pub table: String,
    pub new_records: i64,
}

impl ResultSummary {
    pub fn new(table: impl Into<String>, new_records: i64) -> Self {
        Self {
            table: table.into(),
            new_records,
        }
    }
}

/// Produces a [`ResultSummary`] for a job. `Ok(None)` means the job has no
/// result table configured.
#[async_trait]
pub trait ResultSummarySource: Send + Sync {
    async fn summarize(
        &self,
        job: &JobDefinition,
        since: Timestamp,
    ) -> Result<Option<ResultSummary>, DbError>;
}

/// Counts rows in the job's `result_table` with `created_at >= since`.
pub struct PgResultSummary {
    pool: DbPool,
}

impl PgResultSummary {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultSummarySource for PgResultSummary {
    async fn summarize(
        &self,
        job: &JobDefinition,
        since: Timestamp,
    ) -> Result<Option<ResultSummary>, DbError> {
        let Some(table) = job.result_table.as_deref() else {
            return Ok(None);
        };
        let count = ResultCountRepo::count_created_since(&self.pool, table, since).await?;
        Ok(Some(ResultSummary::new(table, count)))
    }
}
