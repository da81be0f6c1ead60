//! Counts rows a job wrote into its configured result table.

use jobwatch_core::catalog::validate_result_table;
use jobwatch_core::error::CoreError;
use jobwatch_core::types::Timestamp;
use sqlx::PgPool;

use crate::DbError;

/// Column every result table is expected to carry.
const CREATED_AT_COLUMN: &str = "created_at";

/// Provides count queries over arbitrary result tables.
pub struct ResultCountRepo;

impl ResultCountRepo {
    /// Count rows in `table` created at or after `since`.
    pub async fn count_created_since(
        pool: &PgPool,
        table: &str,
        since: Timestamp,
    ) -> Result<i64, DbError> {
        let query = count_query(table)?;
        let count: i64 = sqlx::query_scalar(&query)
            .bind(since)
            .fetch_one(pool)
            .await?;
        tracing::debug!(table, count, "Counted result rows");
        Ok(count)
    }
}

/// Build the count statement. The table name cannot be bound as a
/// parameter, so it is validated and interpolated.
fn count_query(table: &str) -> Result<String, CoreError> {
    validate_result_table(table)?;
    Ok(format!(
        "SELECT COUNT(*) FROM {table} WHERE {CREATED_AT_COLUMN} >= $1"
    ))
}
