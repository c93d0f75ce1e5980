use std::sync::Arc;
use std::time::Instant;

use crate::error::WorkerError;
use crate::models::job::Job;
use crate::models::post::Post;
use crate::services::browser::PageProvider;
use crate::services::collector::{self, CollectLimits};
use crate::services::queue::JobStore;

/// What happened to a job handed to the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { posts: usize },
    Failed { message: String },
    /// Claimed elsewhere, or the claim itself could not be written.
    Skipped,
}

/// Drives one job through claim, scrape and result write.
pub struct JobProcessor {
    store: Arc<dyn JobStore>,
    browser: Arc<dyn PageProvider>,
    limits: CollectLimits,
}

impl JobProcessor {
    pub fn new(
        store: Arc<dyn JobStore>,
        browser: Arc<dyn PageProvider>,
        limits: CollectLimits,
    ) -> Self {
        Self {
            store,
            browser,
            limits,
        }
    }

    /// Process a job. Never fails: scrape errors are recorded on the job and
    /// queue write errors are logged.
    pub async fn process(&self, job: &Job) -> JobOutcome {
        match self.store.try_claim(job.id).await {
            Ok(true) => {}
            Ok(false) => {
                let conflict = WorkerError::ClaimConflict(job.id.to_string());
                tracing::debug!(job_id = %job.id, reason = %conflict, "Skipping job");
                metrics::counter!("scrape_jobs_claim_conflicts_total").increment(1);
                return JobOutcome::Skipped;
            }
            Err(e) => {
                let err = WorkerError::QueueWrite(e.to_string());
                tracing::error!(job_id = %job.id, error = %err, "Failed to claim job");
                return JobOutcome::Skipped;
            }
        }

        tracing::info!(job_id = %job.id, ticker = %job.ticker, "Processing job");
        let start = Instant::now();
        let result = self.scrape(&job.ticker).await;
        metrics::histogram!("scrape_job_duration_seconds").record(start.elapsed().as_secs_f64());

        match result {
            Ok(posts) => {
                if let Err(e) = self.store.complete(job.id, &posts).await {
                    let err = WorkerError::QueueWrite(e.to_string());
                    tracing::error!(job_id = %job.id, error = %err, "Failed to store results");
                    metrics::counter!("scrape_jobs_failed_total", "kind" => err.kind()).increment(1);
                    return JobOutcome::Failed {
                        message: err.to_string(),
                    };
                }
                metrics::counter!("scrape_jobs_completed_total").increment(1);
                metrics::gauge!("scrape_posts_collected").set(posts.len() as f64);
                tracing::info!(job_id = %job.id, posts = posts.len(), "Job completed successfully");
                JobOutcome::Completed { posts: posts.len() }
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(job_id = %job.id, kind = e.kind(), error = %message, "Job failed");
                if let Err(write_err) = self.store.fail(job.id, &message).await {
                    let err = WorkerError::QueueWrite(write_err.to_string());
                    tracing::error!(job_id = %job.id, error = %err, "Failed to record job failure");
                }
                metrics::counter!("scrape_jobs_failed_total", "kind" => e.kind()).increment(1);
                JobOutcome::Failed { message }
            }
        }
    }

    async fn scrape(&self, ticker: &str) -> Result<Vec<Post>, WorkerError> {
        let tab = self.browser.acquire_page().await?;

        // Lazy-loaded images only resolve in the visible tab.
        tab.bring_to_front().await?;
        let result = collector::collect(tab.as_search_page(), ticker, &self.limits).await;
        self.browser.restore_focus().await;

        result
    }
}
