//! Registry of concurrently running trackers.
//!
//! [`TrackerManager`] launches jobs from the catalog, spawns one driver task
//! per launch, and exposes each tracker's latest [`TrackerView`] through a
//! [`watch`] channel. Trackers are independent: each has its own child
//! cancellation token and its own task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use jobwatch_core::catalog::JobCatalog;
use jobwatch_core::progress::StepTable;
use jobwatch_engine::JobLauncher;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::TrackerConfig;
use crate::correlator::Correlator;
use crate::driver::TrackerDriver;
use crate::summary::ResultSummarySource;
use crate::tracker::{ExecutionTracker, TrackerView};

/// How long `cancel` and `shutdown` wait for a driver task to exit.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TrackerManager {
    trackers: RwLock<HashMap<Uuid, ManagedTracker>>,
    catalog: Arc<JobCatalog>,
    steps: StepTable,
    launcher: Arc<dyn JobLauncher>,
    correlator: Arc<dyn Correlator>,
    summaries: Option<Arc<dyn ResultSummarySource>>,
    clock: Arc<dyn Clock>,
    config: TrackerConfig,
    /// Master cancellation token, cancelled during shutdown.
    cancel: CancellationToken,
}

struct ManagedTracker {
    job_key: String,
    views: watch::Receiver<TrackerView>,
    task_handle: Option<JoinHandle<ExecutionTracker>>,
    /// Child of the master token.
    cancel: CancellationToken,
}

impl std::fmt::Debug for TrackerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TrackerManager {
    pub fn new(
        catalog: Arc<JobCatalog>,
        launcher: Arc<dyn JobLauncher>,
        correlator: Arc<dyn Correlator>,
        config: TrackerConfig,
    ) -> Result<Self, TrackerManagerError> {
        config
            .validate()
            .map_err(|e| TrackerManagerError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            trackers: RwLock::new(HashMap::new()),
            steps: StepTable::from_catalog(&catalog, config.step_duration_ms),
            catalog,
            launcher,
            correlator,
            summaries: None,
            clock: Arc::new(SystemClock),
            config,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_summaries(mut self, summaries: Arc<dyn ResultSummarySource>) -> Self {
        self.summaries = Some(summaries);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn catalog(&self) -> &JobCatalog {
        &self.catalog
    }

    /// Launch `job_key` and start tracking it.
    ///
    /// Returns as soon as the tracker exists; the launch call itself runs on
    /// the spawned task, so the first published view is `Launching`.
    pub async fn launch(
        &self,
        job_key: &str,
        payload: serde_json::Value,
    ) -> Result<Uuid, TrackerManagerError> {
        if self.cancel.is_cancelled() {
            return Err(TrackerManagerError::ShuttingDown);
        }
        let job = self
            .catalog
            .get(job_key)
            .cloned()
            .ok_or_else(|| TrackerManagerError::UnknownJob(job_key.to_string()))?;

        let plan = self.steps.plan_for(&job.key);
        let tracker = ExecutionTracker::new(job, plan, &self.config);
        let (view_tx, view_rx) = watch::channel(tracker.view());

        let mut driver =
            TrackerDriver::new(tracker, Arc::clone(&self.correlator), Arc::clone(&self.clock));
        if let Some(summaries) = &self.summaries {
            driver = driver.with_summaries(Arc::clone(summaries));
        }

        let id = Uuid::new_v4();
        let tracker_cancel = self.cancel.child_token();
        let cancel_clone = tracker_cancel.clone();
        let launcher = Arc::clone(&self.launcher);
        let interval = self.config.tick_interval;
        let key = job_key.to_string();

        let task_handle = tokio::spawn(async move {
            tracing::info!(tracker_id = %id, job_key = %key, "Starting tracker task");
            tokio::select! {
                biased;
                _ = cancel_clone.cancelled() => {}
                _ = driver.launch(launcher.as_ref(), &payload) => {}
            }
            view_tx.send_replace(driver.view());
            let tracker = driver.run(interval, cancel_clone, view_tx).await;
            tracing::info!(
                tracker_id = %id,
                job_key = %key,
                state = tracker.state().as_str(),
                "Tracker task exited",
            );
            tracker
        });

        self.trackers.write().await.insert(
            id,
            ManagedTracker {
                job_key: job_key.to_string(),
                views: view_rx,
                task_handle: Some(task_handle),
                cancel: tracker_cancel,
            },
        );

        Ok(id)
    }

    /// Latest view of a tracker.
    pub async fn view(&self, id: Uuid) -> Result<TrackerView, TrackerManagerError> {
        let trackers = self.trackers.read().await;
        let managed = trackers
            .get(&id)
            .ok_or(TrackerManagerError::TrackerNotFound(id))?;
        let view = managed.views.borrow().clone();
        Ok(view)
    }

    /// Receiver that yields every view published by the tracker.
    pub async fn subscribe(
        &self,
        id: Uuid,
    ) -> Result<watch::Receiver<TrackerView>, TrackerManagerError> {
        let trackers = self.trackers.read().await;
        trackers
            .get(&id)
            .map(|managed| managed.views.clone())
            .ok_or(TrackerManagerError::TrackerNotFound(id))
    }

    /// Stop a tracker and wait for its task to exit.
    ///
    /// Cancelling a tracker that already reached a terminal state keeps that
    /// state. The tracker stays registered until acknowledged.
    pub async fn cancel(&self, id: Uuid) -> Result<TrackerView, TrackerManagerError> {
        let (task_handle, views) = {
            let mut trackers = self.trackers.write().await;
            let managed = trackers
                .get_mut(&id)
                .ok_or(TrackerManagerError::TrackerNotFound(id))?;
            managed.cancel.cancel();
            (managed.task_handle.take(), managed.views.clone())
        };

        if let Some(handle) = task_handle {
            if tokio::time::timeout(STOP_TIMEOUT, handle).await.is_err() {
                tracing::warn!(tracker_id = %id, "Tracker task did not stop in time");
            }
        }

        let view = views.borrow().clone();
        Ok(view)
    }

    /// Drop a terminal tracker from the registry.
    pub async fn acknowledge(&self, id: Uuid) -> Result<TrackerView, TrackerManagerError> {
        let mut trackers = self.trackers.write().await;
        let managed = trackers
            .get(&id)
            .ok_or(TrackerManagerError::TrackerNotFound(id))?;

        let view = managed.views.borrow().clone();
        if !view.state.is_terminal() {
            return Err(TrackerManagerError::NotTerminal(id));
        }

        trackers.remove(&id);
        tracing::debug!(tracker_id = %id, job_key = %view.job_key, "Tracker acknowledged");
        Ok(view)
    }

    /// IDs of trackers that have not reached a terminal state.
    pub async fn active_ids(&self) -> Vec<Uuid> {
        self.trackers
            .read()
            .await
            .iter()
            .filter(|(_, managed)| !managed.views.borrow().state.is_terminal())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Every registered tracker with its job key, terminal ones included.
    pub async fn list(&self) -> Vec<(Uuid, String)> {
        self.trackers
            .read()
            .await
            .iter()
            .map(|(id, managed)| (*id, managed.job_key.clone()))
            .collect()
    }

    /// Cancel every tracker and wait for their tasks to exit.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down tracker manager");
        self.cancel.cancel();

        let handles: Vec<(Uuid, JoinHandle<ExecutionTracker>)> = {
            let mut trackers = self.trackers.write().await;
            trackers
                .iter_mut()
                .filter_map(|(id, managed)| managed.task_handle.take().map(|h| (*id, h)))
                .collect()
        };

        let stops = handles.into_iter().map(|(id, handle)| async move {
            if tokio::time::timeout(STOP_TIMEOUT, handle).await.is_err() {
                tracing::warn!(tracker_id = %id, "Tracker task did not stop in time");
            }
        });
        futures::future::join_all(stops).await;

        tracing::info!("Tracker manager shut down complete");
    }
}

/// Errors from [`TrackerManager`] operations.
#[derive(Debug, thiserror::Error)]
pub enum TrackerManagerError {
    #[error("Job '{0}' is not in the catalog")]
    UnknownJob(String),

    #[error("Tracker {0} not found")]
    TrackerNotFound(Uuid),

    #[error("Tracker {0} is still running")]
    NotTerminal(Uuid),

    #[error("Invalid tracker configuration: {0}")]
    InvalidConfig(String),

    #[error("Tracker manager is shutting down")]
    ShuttingDown,
}
