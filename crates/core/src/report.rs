//! Human-facing report derived from a [`HealthSnapshot`].
//!
//! No new aggregation happens here: errors are grouped by job and the
//! per-job statistics are screened against fixed policy thresholds.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::JobCatalog;
use crate::health::{HealthSnapshot, OverallStatus};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// A job with at least this many errors in the window gets a recommendation.
pub const REPEATED_ERROR_THRESHOLD: u32 = 3;

/// Minimum runs before a job's success rate is judged.
pub const LOW_SUCCESS_MIN_RUNS: u32 = 5;

/// Success rate (percent) below which a job gets a recommendation.
pub const LOW_SUCCESS_RATE_PERCENT: f64 = 80.0;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recommendation {
    RepeatedErrors {
        job_key: String,
        error_count: u32,
    },
    LowSuccessRate {
        job_key: String,
        job_remote_id: String,
        total: u32,
        success_rate_percent: f64,
    },
}

impl Recommendation {
    pub fn message(&self) -> String {
        match self {
            Recommendation::RepeatedErrors {
                job_key,
                error_count,
            } => format!("{job_key} failed {error_count} times in the recent window; investigate"),
            Recommendation::LowSuccessRate {
                job_key,
                total,
                success_rate_percent,
                ..
            } => format!(
                "{job_key} succeeded in only {success_rate_percent:.0}% of {total} recent runs"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub overall_status: OverallStatus,
    pub total: u32,
    pub success_rate_percent: f64,
    /// Error counts keyed by job key.
    pub errors_by_job: BTreeMap<String, u32>,
    pub never_executed_count: usize,
    pub stale_count: usize,
    pub recommendations: Vec<Recommendation>,
}

impl HealthReport {
    /// Compact single-line rendering for logs.
    pub fn summary_line(&self) -> String {
        format!(
            "status={} runs={} success_rate={:.1}% error_jobs={} never_executed={} stale={} recommendations={}",
            self.overall_status.as_str(),
            self.total,
            self.success_rate_percent,
            self.errors_by_job.len(),
            self.never_executed_count,
            self.stale_count,
            self.recommendations.len(),
        )
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Group errors by job key.
pub fn errors_by_job(snapshot: &HealthSnapshot) -> BTreeMap<String, u32> {
    let mut grouped = BTreeMap::new();
    for error in &snapshot.errors {
        *grouped.entry(error.job_key.clone()).or_insert(0) += 1;
    }
    grouped
}

/// Derive the report. Repeated-error recommendations come first (ordered by
/// job key), followed by low-success-rate ones (ordered by remote id).
pub fn generate_report(snapshot: &HealthSnapshot, catalog: &JobCatalog) -> HealthReport {
    let errors_by_job = errors_by_job(snapshot);

    let mut recommendations: Vec<Recommendation> = errors_by_job
        .iter()
        .filter(|(_, count)| **count >= REPEATED_ERROR_THRESHOLD)
        .map(|(job_key, &error_count)| Recommendation::RepeatedErrors {
            job_key: job_key.clone(),
            error_count,
        })
        .collect();

    recommendations.extend(
        snapshot
            .per_job_stats
            .iter()
            .filter(|(_, s)| {
                s.total >= LOW_SUCCESS_MIN_RUNS && s.success_rate_percent < LOW_SUCCESS_RATE_PERCENT
            })
            .map(|(remote_id, s)| Recommendation::LowSuccessRate {
                job_key: catalog.resolve(remote_id).0.to_string(),
                job_remote_id: remote_id.clone(),
                total: s.total,
                success_rate_percent: s.success_rate_percent,
            }),
    );

    HealthReport {
        overall_status: snapshot.overall_status,
        total: snapshot.summary.total,
        success_rate_percent: snapshot.summary.success_rate_percent,
        errors_by_job,
        never_executed_count: snapshot.never_executed.len(),
        stale_count: snapshot.stale.len(),
        recommendations,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
