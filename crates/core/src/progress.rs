//! Simulated progress for launched jobs.
//!
//! The engine reports no progress while a job runs, so the tracker shows a
//! time-based estimate walking through a per-job list of step labels. The
//! estimate is capped below 100% so that only a confirmed outcome can show
//! completion.

use std::collections::HashMap;

use crate::catalog::JobCatalog;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Step labels used for jobs without a configured step list.
pub const GENERIC_STEPS: [&str; 3] = ["Starting", "Processing", "Finalizing"];

/// Default time budget per simulated step.
pub const DEFAULT_STEP_DURATION_MS: i64 = 3_000;

/// Upper bound for simulated progress before a real outcome is known.
pub const MAX_SIMULATED_PERCENT: f64 = 95.0;

/// Progress reported once success is confirmed (or assumed).
pub const COMPLETE_PERCENT: f64 = 100.0;

// ---------------------------------------------------------------------------
// StepPlan
// ---------------------------------------------------------------------------

/// Ordered step labels plus the time budget of each step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepPlan {
    labels: Vec<String>,
    step_duration_ms: i64,
}

impl StepPlan {
    /// Build a plan from labels. An empty label list yields the generic plan,
    /// and a non-positive duration falls back to [`DEFAULT_STEP_DURATION_MS`].
    pub fn new(labels: Vec<String>, step_duration_ms: i64) -> Self {
        let labels = if labels.is_empty() {
            GENERIC_STEPS.iter().map(|s| s.to_string()).collect()
        } else {
            labels
        };
        let step_duration_ms = if step_duration_ms > 0 {
            step_duration_ms
        } else {
            DEFAULT_STEP_DURATION_MS
        };
        Self {
            labels,
            step_duration_ms,
        }
    }

    pub fn generic(step_duration_ms: i64) -> Self {
        Self::new(Vec::new(), step_duration_ms)
    }

    pub fn step_count(&self) -> usize {
        self.labels.len()
    }

    pub fn step_duration_ms(&self) -> i64 {
        self.step_duration_ms
    }

    pub fn label(&self, index: usize) -> &str {
        let last = self.labels.len() - 1;
        &self.labels[index.min(last)]
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// `floor(elapsed / step_duration)`, clamped to the last step.
    pub fn step_index(&self, elapsed_ms: i64) -> usize {
        let raw = elapsed_ms.max(0) / self.step_duration_ms;
        (raw as usize).min(self.labels.len() - 1)
    }

    /// Linear progress over the whole plan, capped at
    /// [`MAX_SIMULATED_PERCENT`].
    pub fn percent(&self, elapsed_ms: i64) -> f64 {
        let total_ms = self.labels.len() as f64 * self.step_duration_ms as f64;
        let raw = elapsed_ms.max(0) as f64 / total_ms * 100.0;
        raw.min(MAX_SIMULATED_PERCENT)
    }
}

// ---------------------------------------------------------------------------
// StepTable
// ---------------------------------------------------------------------------

/// Step lists keyed by job key.
#[derive(Debug, Clone, Default)]
pub struct StepTable {
    steps: HashMap<String, Vec<String>>,
    step_duration_ms: i64,
}

impl StepTable {
    pub fn new(step_duration_ms: i64) -> Self {
        Self {
            steps: HashMap::new(),
            step_duration_ms,
        }
    }

    /// Collect the configured step lists of every catalog entry.
    pub fn from_catalog(catalog: &JobCatalog, step_duration_ms: i64) -> Self {
        let steps = catalog
            .iter()
            .filter(|job| !job.steps.is_empty())
            .map(|job| (job.key.clone(), job.steps.clone()))
            .collect();
        Self {
            steps,
            step_duration_ms,
        }
    }

    pub fn insert<I, S>(&mut self, job_key: impl Into<String>, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps
            .insert(job_key.into(), labels.into_iter().map(Into::into).collect());
    }

    /// Plan for a job key, falling back to the generic plan for unknown keys.
    pub fn plan_for(&self, job_key: &str) -> StepPlan {
        let labels = self.steps.get(job_key).cloned().unwrap_or_default();
        StepPlan::new(labels, self.step_duration_ms)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
