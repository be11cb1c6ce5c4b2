//! Job state machine
//!
//! A job is created PENDING at submission, transitions exactly once to
//! SUCCESS or FAIL, and is never mutated after that. Records live in
//! memory for the lifetime of the process.

use crate::db::Candidate;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Success,
    Fail,
}

/// Payload of a successfully completed job
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum JobOutcome {
    /// Ranked candidates from a match job (possibly empty)
    Match(Vec<Candidate>),
    /// Song ids persisted by an ingest job
    Ingest(Vec<i64>),
}

/// Status record for one submitted job
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Create a fresh PENDING record.
    pub fn new(job_id: Uuid) -> Self {
        Self {
            job_id,
            status: JobStatus::Pending,
            result: None,
            error: None,
            submitted_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Whether this record has reached SUCCESS or FAIL.
    pub fn is_terminal(&self) -> bool {
        self.status != JobStatus::Pending
    }

    /// Transition to SUCCESS with a result payload.
    ///
    /// Terminal states are immutable: a late transition is logged and
    /// discarded.
    pub fn complete_success(&mut self, outcome: JobOutcome) {
        if self.is_terminal() {
            warn!(job_id = %self.job_id, "Ignoring transition on terminal job");
            return;
        }
        self.status = JobStatus::Success;
        self.result = Some(outcome);
        self.finished_at = Some(Utc::now());
    }

    /// Transition to FAIL with an error description.
    pub fn complete_failure(&mut self, error: String) {
        if self.is_terminal() {
            warn!(job_id = %self.job_id, "Ignoring transition on terminal job");
            return;
        }
        self.status = JobStatus::Fail;
        self.error = Some(error);
        self.finished_at = Some(Utc::now());
    }
}
