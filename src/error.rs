//! Error kinds surfaced by the scrape worker.
//!
//! Every per-job failure is one of these variants by the time it reaches the
//! job processor, which records it as a failed job. Only [`WorkerError::Startup`]
//! is allowed to end the worker process.

/// Closed set of worker failure kinds, each carrying a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkerError {
    /// The browser remote-debugging endpoint could not be reached.
    #[error("Cannot connect to browser: {0}")]
    Startup(String),

    /// The search page failed to load.
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// No post appeared on the search page in time.
    #[error("Timed out waiting for content: {0}")]
    ContentTimeout(String),

    /// A single post element could not be parsed. Never fails a job.
    #[error("Skipped post element: {0}")]
    ExtractionSkip(String),

    /// The queue store rejected a status write.
    #[error("Failed to persist job state: {0}")]
    QueueWrite(String),

    /// Another intake path or worker already claimed the job.
    #[error("Job already claimed: {0}")]
    ClaimConflict(String),
}

impl WorkerError {
    /// Short stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::Startup(_) => "startup",
            WorkerError::Navigation(_) => "navigation",
            WorkerError::ContentTimeout(_) => "content_timeout",
            WorkerError::ExtractionSkip(_) => "extraction_skip",
            WorkerError::QueueWrite(_) => "queue_write",
            WorkerError::ClaimConflict(_) => "claim_conflict",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_human_readable() {
        let err = WorkerError::Navigation("net::ERR_CONNECTION_REFUSED".into());
        assert_eq!(
            err.to_string(),
            "Navigation failed: net::ERR_CONNECTION_REFUSED"
        );
        assert_eq!(err.kind(), "navigation");
    }

    #[test]
    fn test_startup_kind() {
        let err = WorkerError::Startup("connection refused".into());
        assert_eq!(err.kind(), "startup");
        assert!(err.to_string().contains("connection refused"));
    }
}
