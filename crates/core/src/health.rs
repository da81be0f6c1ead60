//! Health aggregation over a window of execution history.
//!
//! Turns a flat list of [`ExecutionRecord`]s into a [`HealthSnapshot`]:
//! status counts, an error list resolved against the catalog, per-job
//! statistics, staleness classification, and an overall verdict. Every
//! snapshot is a full recomputation; nothing is patched incrementally.

use std::collections::{BTreeMap, HashMap};

use chrono::Duration;
use serde::Serialize;

use crate::catalog::JobCatalog;
use crate::execution::{ExecutionRecord, ExecutionStatus};
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Number of records fetched per snapshot.
pub const DEFAULT_HISTORY_WINDOW: usize = 100;

/// A job whose newest execution is older than this is stale.
pub const DEFAULT_STALE_AFTER_DAYS: i64 = 7;

/// More waiting executions than this raises the verdict to `Attention`.
pub const ATTENTION_WAITING_THRESHOLD: u32 = 3;

// ---------------------------------------------------------------------------
// OverallStatus
// ---------------------------------------------------------------------------

/// Overall verdict, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Healthy,
    Attention,
    Warning,
    Critical,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Healthy => "healthy",
            OverallStatus::Attention => "attention",
            OverallStatus::Warning => "warning",
            OverallStatus::Critical => "critical",
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// Status counts across the whole window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSummary {
    pub total: u32,
    pub success: u32,
    pub error: u32,
    pub waiting: u32,
    pub running: u32,
    pub success_rate_percent: f64,
}

/// An error execution resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    pub execution_id: String,
    pub job_remote_id: String,
    pub job_key: String,
    pub is_critical: bool,
    pub started_at: Option<Timestamp>,
    pub stopped_at: Option<Timestamp>,
}

/// Per-job fold of every record in the window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStats {
    pub total: u32,
    pub success: u32,
    pub error: u32,
    pub last_run_at: Option<Timestamp>,
    pub success_rate_percent: f64,
}

/// A catalog job with no execution on record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NeverExecutedJob {
    pub job_key: String,
    pub remote_id: String,
    pub is_critical: bool,
}

/// A catalog job whose newest execution is older than the threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleJob {
    pub job_key: String,
    pub remote_id: String,
    pub last_run_at: Timestamp,
    pub days_since_last_run: i64,
}

/// Point-in-time rollup of execution history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub overall_status: OverallStatus,
    pub summary: HealthSummary,
    pub errors: Vec<ErrorEntry>,
    /// Keyed by job remote id.
    pub per_job_stats: BTreeMap<String, JobStats>,
    pub never_executed: Vec<NeverExecutedJob>,
    pub stale: Vec<StaleJob>,
    pub computed_at: Timestamp,
}

/// Output of the staleness pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Staleness {
    pub never_executed: Vec<NeverExecutedJob>,
    pub stale: Vec<StaleJob>,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// `success / total * 100`, defined as 100 for an empty set.
pub fn success_rate_percent(success: u32, total: u32) -> f64 {
    if total == 0 {
        return 100.0;
    }
    success as f64 / total as f64 * 100.0
}

/// Count records by status.
pub fn summarize(records: &[ExecutionRecord]) -> HealthSummary {
    let mut summary = HealthSummary {
        total: 0,
        success: 0,
        error: 0,
        waiting: 0,
        running: 0,
        success_rate_percent: 0.0,
    };

    for record in records {
        summary.total += 1;
        match record.status {
            ExecutionStatus::Success => summary.success += 1,
            ExecutionStatus::Error => summary.error += 1,
            ExecutionStatus::Waiting => summary.waiting += 1,
            ExecutionStatus::Running => summary.running += 1,
            ExecutionStatus::Canceled | ExecutionStatus::Unknown => {}
        }
    }

    summary.success_rate_percent = success_rate_percent(summary.success, summary.total);
    summary
}

/// Resolve every error record against the catalog, preserving input order.
pub fn collect_errors(catalog: &JobCatalog, records: &[ExecutionRecord]) -> Vec<ErrorEntry> {
    records
        .iter()
        .filter(|r| r.status == ExecutionStatus::Error)
        .map(|r| {
            let (job_key, is_critical) = catalog.resolve(&r.job_remote_id);
            ErrorEntry {
                execution_id: r.id.clone(),
                job_remote_id: r.job_remote_id.clone(),
                job_key: job_key.to_string(),
                is_critical,
                started_at: r.started_at,
                stopped_at: r.stopped_at,
            }
        })
        .collect()
}

/// Fold every record into a per-remote-id accumulator.
pub fn per_job_stats(records: &[ExecutionRecord]) -> BTreeMap<String, JobStats> {
    let mut stats: BTreeMap<String, JobStats> = BTreeMap::new();

    for record in records {
        let entry = stats
            .entry(record.job_remote_id.clone())
            .or_insert(JobStats {
                total: 0,
                success: 0,
                error: 0,
                last_run_at: None,
                success_rate_percent: 0.0,
            });
        entry.total += 1;
        match record.status {
            ExecutionStatus::Success => entry.success += 1,
            ExecutionStatus::Error => entry.error += 1,
            _ => {}
        }
        entry.last_run_at = entry.last_run_at.max(record.started_at);
    }

    for entry in stats.values_mut() {
        entry.success_rate_percent = success_rate_percent(entry.success, entry.total);
    }

    stats
}

/// Overall verdict. First match wins, most severe first.
pub fn overall_status(summary: &HealthSummary, errors: &[ErrorEntry]) -> OverallStatus {
    if errors.iter().any(|e| e.is_critical) {
        OverallStatus::Critical
    } else if !errors.is_empty() {
        OverallStatus::Warning
    } else if summary.waiting > ATTENTION_WAITING_THRESHOLD {
        OverallStatus::Attention
    } else {
        OverallStatus::Healthy
    }
}

/// Walk the catalog once and classify each job as never executed, stale, or
/// active (not reported).
///
/// `evidence` may contain records for any job, in any order, with
/// duplicates.
pub fn classify_staleness(
    catalog: &JobCatalog,
    evidence: &[ExecutionRecord],
    now: Timestamp,
    stale_after: Duration,
) -> Staleness {
    let mut newest: HashMap<&str, Timestamp> = HashMap::new();
    for record in evidence {
        let Some(started_at) = record.started_at else {
            continue;
        };
        newest
            .entry(record.job_remote_id.as_str())
            .and_modify(|t| *t = (*t).max(started_at))
            .or_insert(started_at);
    }

    let cutoff = now - stale_after;
    let mut staleness = Staleness::default();

    for job in catalog.iter() {
        match newest.get(job.remote_id.as_str()) {
            None => staleness.never_executed.push(NeverExecutedJob {
                job_key: job.key.clone(),
                remote_id: job.remote_id.clone(),
                is_critical: job.is_critical(),
            }),
            Some(&last_run_at) if last_run_at < cutoff => staleness.stale.push(StaleJob {
                job_key: job.key.clone(),
                remote_id: job.remote_id.clone(),
                last_run_at,
                days_since_last_run: (now - last_run_at).num_days(),
            }),
            Some(_) => {}
        }
    }

    staleness
}

/// Build a complete snapshot.
///
/// `window` drives the summary, errors, and per-job statistics.
/// `staleness_evidence` holds any additional records gathered for the
/// staleness pass; the window is always counted as evidence too.
pub fn build_snapshot(
    catalog: &JobCatalog,
    window: &[ExecutionRecord],
    staleness_evidence: &[ExecutionRecord],
    now: Timestamp,
    stale_after: Duration,
) -> HealthSnapshot {
    let summary = summarize(window);
    let errors = collect_errors(catalog, window);
    let per_job_stats = per_job_stats(window);
    let overall_status = overall_status(&summary, &errors);

    let evidence: Vec<ExecutionRecord> = window
        .iter()
        .chain(staleness_evidence.iter())
        .cloned()
        .collect();
    let Staleness {
        never_executed,
        stale,
    } = classify_staleness(catalog, &evidence, now, stale_after);

    HealthSnapshot {
        overall_status,
        summary,
        errors,
        per_job_stats,
        never_executed,
        stale,
        computed_at: now,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
