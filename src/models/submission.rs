use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::job::{Job, JobResults, JobStatus};

/// Marker every stored ticker starts with.
pub const TICKER_MARKER: char = '$';

/// Request to queue a ticker search.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitJobRequest {
    #[garde(length(chars, min = 1, max = 32))]
    pub ticker: String,
}

impl SubmitJobRequest {
    /// Trim and prefix the `$` marker when missing. Validation runs on the
    /// normalized value.
    pub fn normalized(self) -> Self {
        let trimmed = self.ticker.trim();
        let ticker = if trimmed.is_empty() || trimmed.starts_with(TICKER_MARKER) {
            trimmed.to_string()
        } else {
            format!("{TICKER_MARKER}{trimmed}")
        };
        Self { ticker }
    }
}

/// Response after queueing a job.
#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: Uuid,
    pub ticker: String,
    pub status: JobStatus,
}

/// Response for querying job status.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub ticker: String,
    pub status: JobStatus,
    pub results: Option<JobResults>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            ticker: job.ticker,
            status: job.status,
            results: job.results,
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}
