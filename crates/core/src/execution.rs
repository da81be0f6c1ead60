//! Read-only projection of executions reported by the automation engine.
//!
//! Records are only ever read in batches from the engine's listing
//! endpoint; nothing here is persisted locally.

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// ExecutionStatus
// ---------------------------------------------------------------------------

/// Status of a remote execution.
///
/// The engine reports a few statuses beyond the core set; they are folded
/// onto the nearest member. Anything unrecognised becomes `Unknown`, which
/// only contributes to totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    #[serde(alias = "new")]
    Waiting,
    Success,
    #[serde(alias = "crashed", alias = "failed")]
    Error,
    #[serde(alias = "cancelled")]
    Canceled,
    #[serde(other)]
    Unknown,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Waiting => "waiting",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Error => "error",
            ExecutionStatus::Canceled => "canceled",
            ExecutionStatus::Unknown => "unknown",
        }
    }

    /// `true` while the engine may still change the status.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, ExecutionStatus::Running | ExecutionStatus::Waiting)
    }
}

// ---------------------------------------------------------------------------
// ExecutionRecord
// ---------------------------------------------------------------------------

/// One past or in-progress run of some job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    /// Remote id of the job this execution belongs to.
    #[serde(
        rename = "workflowId",
        alias = "jobRemoteId",
        deserialize_with = "deserialize_id"
    )]
    pub job_remote_id: String,
    pub status: ExecutionStatus,
    /// Absent for executions still queued on the engine.
    #[serde(default)]
    pub started_at: Option<Timestamp>,
    #[serde(default)]
    pub stopped_at: Option<Timestamp>,
    #[serde(default)]
    pub mode: Option<String>,
}

impl ExecutionRecord {
    pub fn new(
        id: impl Into<String>,
        job_remote_id: impl Into<String>,
        status: ExecutionStatus,
        started_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            job_remote_id: job_remote_id.into(),
            status,
            started_at: Some(started_at),
            stopped_at: None,
            mode: None,
        }
    }

    /// A queued execution that has not started yet.
    pub fn queued(id: impl Into<String>, job_remote_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            job_remote_id: job_remote_id.into(),
            status: ExecutionStatus::Waiting,
            started_at: None,
            stopped_at: None,
            mode: None,
        }
    }

    pub fn with_stopped_at(mut self, stopped_at: Timestamp) -> Self {
        self.stopped_at = Some(stopped_at);
        self
    }

    /// Wall-clock duration in milliseconds, if the execution has started
    /// and stopped.
    pub fn duration_ms(&self) -> Option<i64> {
        let started = self.started_at?;
        self.stopped_at
            .map(|stopped| (stopped - started).num_milliseconds())
    }
}

/// Engine ids arrive as either JSON strings or numbers.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Listing body
// ---------------------------------------------------------------------------

/// Body of the engine's "list executions" response.
///
/// Accepts either a bare JSON array or an object wrapping the array in
/// `data` (with pagination fields ignored).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ExecutionListBody {
    Bare(Vec<ExecutionRecord>),
    Wrapped { data: Vec<ExecutionRecord> },
}

impl ExecutionListBody {
    pub fn into_records(self) -> Vec<ExecutionRecord> {
        match self {
            ExecutionListBody::Bare(records) | ExecutionListBody::Wrapped { data: records } => {
                records
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
