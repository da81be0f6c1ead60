//! Job catalog: the fixed set of jobs the automation engine knows about.
//!
//! The catalog is loaded once at startup from configuration and shared
//! read-only between the tracker and the health aggregator. Nothing in the
//! workspace mutates it after construction.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Job key reported for execution records whose remote id is not in the
/// catalog.
pub const UNKNOWN_JOB_KEY: &str = "Unknown";

/// Maximum length of a job key.
const MAX_KEY_LEN: usize = 128;

/// Result tables are interpolated into SQL, so only plain (optionally
/// schema-qualified) identifiers are accepted.
const RESULT_TABLE_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]{0,62}(\.[A-Za-z_][A-Za-z0-9_]{0,62})?$";

static RESULT_TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(RESULT_TABLE_PATTERN).expect("valid regex"));

// ---------------------------------------------------------------------------
// JobCategory
// ---------------------------------------------------------------------------

/// Closed set of job categories. Criticality is derived from the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobCategory {
    Orchestration,
    DataCollection,
    Processing,
    Content,
    Monitoring,
    Utility,
}

impl JobCategory {
    /// String representation used in configuration and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobCategory::Orchestration => "orchestration",
            JobCategory::DataCollection => "data-collection",
            JobCategory::Processing => "processing",
            JobCategory::Content => "content",
            JobCategory::Monitoring => "monitoring",
            JobCategory::Utility => "utility",
        }
    }

    /// Whether a failure of a job in this category makes the whole catalog
    /// critical.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            JobCategory::Orchestration | JobCategory::DataCollection | JobCategory::Processing
        )
    }
}

// ---------------------------------------------------------------------------
// JobDefinition
// ---------------------------------------------------------------------------

/// A single job known to the automation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDefinition {
    /// Stable identifier used internally (and for step-table lookup).
    pub key: String,
    /// Identifier as known to the engine; matched against execution records.
    pub remote_id: String,
    /// Path appended to the engine base URL by the launch call.
    pub launch_path: String,
    pub category: JobCategory,
    /// Human-readable step labels used for simulated progress. Empty means
    /// the generic fallback plan.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<String>,
    /// Table whose new rows summarise a successful run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_table: Option<String>,
}

impl JobDefinition {
    pub fn new(
        key: impl Into<String>,
        remote_id: impl Into<String>,
        launch_path: impl Into<String>,
        category: JobCategory,
    ) -> Self {
        Self {
            key: key.into(),
            remote_id: remote_id.into(),
            launch_path: launch_path.into(),
            category,
            steps: Vec::new(),
            result_table: None,
        }
    }

    pub fn with_steps<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps = steps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_result_table(mut self, table: impl Into<String>) -> Self {
        self.result_table = Some(table.into());
        self
    }

    pub fn is_critical(&self) -> bool {
        self.category.is_critical()
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a job key.
///
/// Rules:
/// - Must not be empty or whitespace.
/// - Must not exceed `MAX_KEY_LEN` characters.
pub fn validate_job_key(key: &str) -> Result<(), CoreError> {
    if key.trim().is_empty() {
        return Err(CoreError::Validation("Job key must not be empty".to_string()));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(CoreError::Validation(format!(
            "Job key must not exceed {MAX_KEY_LEN} characters"
        )));
    }
    Ok(())
}

/// Validate a result table name before it is interpolated into SQL.
pub fn validate_result_table(table: &str) -> Result<(), CoreError> {
    if !RESULT_TABLE_RE.is_match(table) {
        return Err(CoreError::Validation(format!(
            "Result table '{table}' is not a plain SQL identifier"
        )));
    }
    Ok(())
}

fn validate_definition(job: &JobDefinition) -> Result<(), CoreError> {
    validate_job_key(&job.key)?;
    if job.remote_id.trim().is_empty() {
        return Err(CoreError::Validation(format!(
            "Job '{}' has an empty remote id",
            job.key
        )));
    }
    if job.launch_path.trim().is_empty() {
        return Err(CoreError::Validation(format!(
            "Job '{}' has an empty launch path",
            job.key
        )));
    }
    if let Some(table) = &job.result_table {
        validate_result_table(table)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// JobCatalog
// ---------------------------------------------------------------------------

/// Immutable, validated collection of [`JobDefinition`]s.
///
/// Preserves configuration order for iteration and indexes entries by both
/// key and remote id.
#[derive(Debug, Clone, Default)]
pub struct JobCatalog {
    jobs: Vec<JobDefinition>,
    by_key: HashMap<String, usize>,
    by_remote_id: HashMap<String, usize>,
}

impl JobCatalog {
    /// Build a catalog, rejecting invalid entries and duplicate keys or
    /// remote ids.
    pub fn new(jobs: Vec<JobDefinition>) -> Result<Self, CoreError> {
        let mut by_key = HashMap::with_capacity(jobs.len());
        let mut by_remote_id = HashMap::with_capacity(jobs.len());

        for (idx, job) in jobs.iter().enumerate() {
            validate_definition(job)?;
            if by_key.insert(job.key.clone(), idx).is_some() {
                return Err(CoreError::Validation(format!(
                    "Duplicate job key '{}'",
                    job.key
                )));
            }
            if by_remote_id.insert(job.remote_id.clone(), idx).is_some() {
                return Err(CoreError::Validation(format!(
                    "Duplicate remote id '{}' (job '{}')",
                    job.remote_id, job.key
                )));
            }
        }

        Ok(Self {
            jobs,
            by_key,
            by_remote_id,
        })
    }

    /// Parse a catalog from a JSON array of job definitions.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let jobs: Vec<JobDefinition> = serde_json::from_str(json)
            .map_err(|e| CoreError::Config(format!("Invalid job catalog JSON: {e}")))?;
        Self::new(jobs)
    }

    pub fn get(&self, key: &str) -> Option<&JobDefinition> {
        self.by_key.get(key).map(|&idx| &self.jobs[idx])
    }

    /// Look up a job by key, returning `NotFound` when absent.
    pub fn require(&self, key: &str) -> Result<&JobDefinition, CoreError> {
        self.get(key).ok_or_else(|| CoreError::NotFound {
            entity: "job",
            key: key.to_string(),
        })
    }

    pub fn by_remote_id(&self, remote_id: &str) -> Option<&JobDefinition> {
        self.by_remote_id.get(remote_id).map(|&idx| &self.jobs[idx])
    }

    /// Resolve a remote id to `(job_key, is_critical)`.
    ///
    /// Unknown remote ids resolve to [`UNKNOWN_JOB_KEY`] and non-critical.
    pub fn resolve(&self, remote_id: &str) -> (&str, bool) {
        match self.by_remote_id(remote_id) {
            Some(job) => (job.key.as_str(), job.is_critical()),
            None => (UNKNOWN_JOB_KEY, false),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &JobDefinition> {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
