//! Periodic health recomputation.
//!
//! [`HealthMonitor`] runs as a background task, recomputing the snapshot on
//! a fixed interval. Readers always see the last complete snapshot; a new
//! one replaces it only once fully computed. A failed cycle is logged and
//! recorded, and the loop carries on with the next tick.

use std::sync::Arc;

use chrono::Utc;
use jobwatch_core::health::HealthSnapshot;
use jobwatch_core::report::{generate_report, HealthReport};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::aggregator::{HealthAggregator, HealthError};

/// A failed cycle, kept until the next successful one.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleFailure {
    pub message: String,
    pub failed_at: jobwatch_core::types::Timestamp,
}

pub struct HealthMonitor {
    aggregator: HealthAggregator,
    latest: RwLock<Option<Arc<HealthSnapshot>>>,
    last_failure: RwLock<Option<CycleFailure>>,
}

impl HealthMonitor {
    pub fn new(aggregator: HealthAggregator) -> Self {
        Self {
            aggregator,
            latest: RwLock::new(None),
            last_failure: RwLock::new(None),
        }
    }

    /// Last complete snapshot, if any cycle has succeeded yet.
    pub async fn latest(&self) -> Option<Arc<HealthSnapshot>> {
        self.latest.read().await.clone()
    }

    /// Report derived from the last complete snapshot.
    pub async fn latest_report(&self) -> Option<HealthReport> {
        let snapshot = self.latest().await?;
        Some(generate_report(&snapshot, self.aggregator.catalog()))
    }

    pub async fn last_failure(&self) -> Option<CycleFailure> {
        self.last_failure.read().await.clone()
    }

    /// Recompute immediately. On failure the previous snapshot is kept.
    pub async fn refresh_now(&self) -> Result<Arc<HealthSnapshot>, HealthError> {
        let now = Utc::now();
        match self.aggregator.compute_snapshot(now).await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                let report = generate_report(&snapshot, self.aggregator.catalog());
                tracing::info!(summary = %report.summary_line(), "Health report");
                for recommendation in &report.recommendations {
                    tracing::warn!(recommendation = %recommendation.message(), "Health recommendation");
                }

                *self.latest.write().await = Some(Arc::clone(&snapshot));
                *self.last_failure.write().await = None;
                Ok(snapshot)
            }
            Err(e) => {
                *self.last_failure.write().await = Some(CycleFailure {
                    message: e.to_string(),
                    failed_at: now,
                });
                Err(e)
            }
        }
    }

    /// Run the recomputation loop until `cancel` fires. The first cycle
    /// runs immediately.
    pub async fn run(&self, cancel: CancellationToken) {
        let period = self.aggregator.config().interval;
        let mut interval = tokio::time::interval(period);
        // A slow cycle postpones the next one instead of triggering a burst.
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(interval_secs = period.as_secs(), "Health monitor started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Health monitor stopping");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.refresh_now().await {
                        tracing::warn!(error = %e, "Health cycle failed");
                    }
                }
            }
        }
    }
}
