//! `jobwatch-monitor` -- execution tracking and health daemon.
//!
//! Recomputes the health snapshot of every job in the catalog on a fixed
//! interval and logs the resulting report. Jobs named in `LAUNCH_ON_START`
//! are launched once at startup and tracked until they finish.
//!
//! See [`MonitorConfig::from_env`] for the environment variables.

use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jobwatch_monitor::app;
use jobwatch_monitor::config::{load_catalog, MonitorConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "jobwatch_monitor=info,jobwatch_tracker=info,jobwatch_health=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = MonitorConfig::from_env().context("Invalid configuration")?;
    let catalog = load_catalog(&config.catalog_path).context("Failed to load job catalog")?;
    tracing::info!(
        engine = %config.engine_api_url,
        jobs = catalog.len(),
        tick_ms = config.tracker.tick_interval.as_millis() as u64,
        timeout_policy = config.tracker.timeout_policy.as_str(),
        health_interval_secs = config.health.interval.as_secs(),
        "Loaded monitor configuration",
    );

    // --- Services ---
    let services = app::build(&config, catalog).await?;
    let cancel = CancellationToken::new();

    // --- Health monitor ---
    let health_handle = tokio::spawn({
        let health = services.health.clone();
        let cancel = cancel.clone();
        async move { health.run(cancel).await }
    });

    // --- Startup launches ---
    let mut watcher_handles = Vec::new();
    for job_key in &config.launch_on_start {
        match services
            .trackers
            .launch(job_key, serde_json::Value::Object(Default::default()))
            .await
        {
            Ok(id) => {
                let views = services.trackers.subscribe(id).await?;
                watcher_handles.push(tokio::spawn(app::log_transitions(
                    id,
                    views,
                    cancel.clone(),
                )));
            }
            Err(e) => tracing::error!(job_key = %job_key, error = %e, "Startup launch rejected"),
        }
    }

    shutdown_signal().await;

    // --- Shutdown ---
    tracing::info!("Shutdown signal received, cleaning up");
    services.trackers.shutdown().await;
    cancel.cancel();

    let _ = tokio::time::timeout(Duration::from_secs(5), health_handle).await;
    for handle in watcher_handles {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    tracing::info!(
        catalog_jobs = services.catalog.len(),
        "Graceful shutdown complete"
    );
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
