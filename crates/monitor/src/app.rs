//! Builds the tracker manager and health monitor from a [`MonitorConfig`].

use std::sync::Arc;

use anyhow::Context;
use jobwatch_core::catalog::JobCatalog;
use jobwatch_engine::EngineApi;
use jobwatch_health::{HealthAggregator, HealthMonitor};
use jobwatch_tracker::{PgResultSummary, TimeWindowCorrelator, TrackerManager, TrackerState};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::MonitorConfig;

/// Long-lived services shared by the daemon.
pub struct Services {
    pub catalog: Arc<JobCatalog>,
    pub trackers: Arc<TrackerManager>,
    pub health: Arc<HealthMonitor>,
}

/// Build every service. Connects to the database only when
/// `DATABASE_URL` is configured.
pub async fn build(config: &MonitorConfig, catalog: JobCatalog) -> anyhow::Result<Services> {
    let catalog = Arc::new(catalog);

    let client = reqwest::Client::builder()
        .timeout(config.engine_request_timeout)
        .build()
        .context("Failed to build engine HTTP client")?;
    let mut api = EngineApi::with_client(client, config.engine_api_url.clone());
    if let Some(url) = &config.engine_webhook_url {
        api = api.with_webhook_url(url.clone());
    }
    if let Some(key) = &config.engine_api_key {
        api = api.with_api_key(key.clone());
    }
    let api = Arc::new(api);

    let correlator = Arc::new(TimeWindowCorrelator::new(
        api.clone(),
        config.tracker.correlation_window,
        config.tracker.correlation_slack_ms,
    ));

    let mut trackers = TrackerManager::new(
        Arc::clone(&catalog),
        api.clone(),
        correlator,
        config.tracker.clone(),
    )?;

    if let Some(database_url) = &config.database_url {
        let pool = jobwatch_db::create_pool(database_url)
            .await
            .context("Failed to connect to database")?;
        jobwatch_db::health_check(&pool)
            .await
            .context("Database health check failed")?;
        tracing::info!("Result summary store enabled");
        trackers = trackers.with_summaries(Arc::new(PgResultSummary::new(pool)));
    }

    let health = HealthMonitor::new(HealthAggregator::new(
        Arc::clone(&catalog),
        api,
        config.health.clone(),
    ));

    Ok(Services {
        catalog,
        trackers: Arc::new(trackers),
        health: Arc::new(health),
    })
}

/// Log every state change of one tracker until it reaches a terminal state
/// or `cancel` fires.
pub async fn log_transitions(
    id: Uuid,
    mut views: watch::Receiver<jobwatch_tracker::TrackerView>,
    cancel: CancellationToken,
) {
    let mut last_state: Option<TrackerState> = None;
    loop {
        let view = views.borrow_and_update().clone();
        if last_state != Some(view.state) {
            tracing::info!(
                tracker_id = %id,
                job_key = %view.job_key,
                state = view.state.as_str(),
                step = %view.step_label,
                progress = view.progress_percent,
                verified = view.outcome_verified,
                "Tracker state changed",
            );
            last_state = Some(view.state);
        }
        if view.state.is_terminal() {
            if let Some(summary) = &view.result_summary {
                tracing::info!(
                    tracker_id = %id,
                    table = %summary.table,
                    new_records = summary.new_records,
                    "Job produced records",
                );
            }
            if let Some(error) = &view.last_error {
                tracing::error!(tracker_id = %id, error = %error, "Job failed");
            }
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}
