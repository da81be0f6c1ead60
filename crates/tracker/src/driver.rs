//! Async driver that owns one [`ExecutionTracker`] and feeds it ticks,
//! correlation results and the post-success summary.

use std::sync::Arc;
use std::time::Duration;

use jobwatch_engine::JobLauncher;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::correlator::Correlator;
use crate::summary::ResultSummarySource;
use crate::tracker::{ExecutionTracker, TickPlan, TrackerState, TrackerView};

pub struct TrackerDriver {
    tracker: ExecutionTracker,
    correlator: Arc<dyn Correlator>,
    summaries: Option<Arc<dyn ResultSummarySource>>,
    clock: Arc<dyn Clock>,
    summary_attempted: bool,
}

impl TrackerDriver {
    pub fn new(
        tracker: ExecutionTracker,
        correlator: Arc<dyn Correlator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tracker,
            correlator,
            summaries: None,
            clock,
            summary_attempted: false,
        }
    }

    /// Look up a result summary once the tracker reaches `Succeeded`.
    pub fn with_summaries(mut self, summaries: Arc<dyn ResultSummarySource>) -> Self {
        self.summaries = Some(summaries);
        self
    }

    pub fn tracker(&self) -> &ExecutionTracker {
        &self.tracker
    }

    pub fn view(&self) -> TrackerView {
        self.tracker.view()
    }

    pub fn into_tracker(self) -> ExecutionTracker {
        self.tracker
    }

    pub fn cancel(&mut self) -> bool {
        let cancelled = self.tracker.cancel();
        if cancelled {
            tracing::info!(job_key = %self.tracker.job().key, "Tracker cancelled");
        }
        cancelled
    }

    /// Fire the launch call and record its outcome.
    pub async fn launch(&mut self, launcher: &dyn JobLauncher, payload: &serde_json::Value) {
        let job_key = self.tracker.job().key.clone();
        let result = launcher.launch(self.tracker.job(), payload).await;

        if let Err(e) = &result {
            tracing::warn!(job_key = %job_key, error = %e, "Launch call failed");
        }
        self.tracker.record_launch(self.clock.now(), result);
        tracing::info!(
            job_key = %job_key,
            state = self.tracker.state().as_str(),
            "Job launched",
        );
    }

    /// Process one tick. Correlation errors are logged and swallowed.
    pub async fn tick(&mut self) -> TrackerState {
        let now = self.clock.now();

        if let TickPlan::Correlate { launched_at } = self.tracker.begin_tick(now) {
            match self
                .correlator
                .correlate(self.tracker.job(), launched_at)
                .await
            {
                Ok(outcome) => self.tracker.apply_correlation(&outcome),
                Err(e) => {
                    self.tracker.record_correlation_failure();
                    tracing::warn!(
                        job_key = %self.tracker.job().key,
                        poll_count = self.tracker.poll_count(),
                        error = %e,
                        "Correlation read failed",
                    );
                }
            }
        }

        if self.tracker.end_tick() {
            tracing::warn!(
                job_key = %self.tracker.job().key,
                poll_count = self.tracker.poll_count(),
                state = self.tracker.state().as_str(),
                "Poll ceiling reached without a matched outcome",
            );
        }

        if self.tracker.state() == TrackerState::Succeeded && !self.summary_attempted {
            self.summary_attempted = true;
            self.fetch_summary().await;
        }

        self.tracker.state()
    }

    /// Tick every `interval` until the tracker is terminal or `cancel` fires.
    ///
    /// The current view is published to `views` after every tick and once
    /// more on exit. The first tick fires one full interval after the call.
    pub async fn run(
        mut self,
        interval: Duration,
        cancel: CancellationToken,
        views: watch::Sender<TrackerView>,
    ) -> ExecutionTracker {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.tracker.is_terminal() {
            let cancelled = tokio::select! {
                biased;
                _ = cancel.cancelled() => true,
                _ = async {
                    ticker.tick().await;
                    self.tick().await;
                } => false,
            };

            if cancelled {
                self.cancel();
                break;
            }
            views.send_replace(self.tracker.view());
        }

        views.send_replace(self.tracker.view());
        tracing::debug!(
            job_key = %self.tracker.job().key,
            state = self.tracker.state().as_str(),
            "Tracker loop exited",
        );
        self.tracker
    }

    // ---- private helpers ----

    async fn fetch_summary(&mut self) {
        let (Some(summaries), Some(launched_at)) = (&self.summaries, self.tracker.launched_at())
        else {
            return;
        };

        match summaries.summarize(self.tracker.job(), launched_at).await {
            Ok(Some(summary)) => {
                tracing::info!(
                    job_key = %self.tracker.job().key,
                    table = %summary.table,
                    new_records = summary.new_records,
                    "Result summary",
                );
                self.tracker.attach_result_summary(summary);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    job_key = %self.tracker.job().key,
                    error = %e,
                    "Result summary lookup failed",
                );
            }
        }
    }
}
