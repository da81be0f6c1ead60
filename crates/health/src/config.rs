use std::time::Duration;

use jobwatch_core::error::CoreError;
use jobwatch_core::health::{DEFAULT_HISTORY_WINDOW, DEFAULT_STALE_AFTER_DAYS};

/// Default interval between scheduled snapshots.
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(300);

/// Records fetched per catalog entry during the staleness pass.
pub const DEFAULT_STALENESS_LOOKUP_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct HealthConfig {
    /// Records fetched for the summary, errors and per-job statistics.
    pub history_window: usize,
    pub interval: Duration,
    pub stale_after_days: i64,
    /// Records fetched per job when looking for its newest run.
    pub staleness_lookup_limit: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            history_window: DEFAULT_HISTORY_WINDOW,
            interval: DEFAULT_HEALTH_INTERVAL,
            stale_after_days: DEFAULT_STALE_AFTER_DAYS,
            staleness_lookup_limit: DEFAULT_STALENESS_LOOKUP_LIMIT,
        }
    }
}

impl HealthConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.history_window == 0 {
            return Err(CoreError::Config("History window must be at least 1".into()));
        }
        if self.interval.is_zero() {
            return Err(CoreError::Config("Health interval must be positive".into()));
        }
        if self.stale_after_days <= 0 {
            return Err(CoreError::Config(
                "Staleness threshold must be at least one day".into(),
            ));
        }
        Ok(())
    }

    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::days(self.stale_after_days)
    }
}
