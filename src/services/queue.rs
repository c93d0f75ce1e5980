use async_trait::async_trait;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::db::{self, queries};
use crate::models::job::Job;
use crate::models::post::Post;

/// Buffered jobs between the notification task and the listener.
const FEED_CAPACITY: usize = 256;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// The shared job queue the worker reads from and reports into.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Pending jobs ordered by creation time, oldest first.
    async fn list_pending(&self) -> Result<Vec<Job>, QueueError>;

    /// Conditional pending -> processing transition. Exactly one caller wins.
    async fn try_claim(&self, job_id: Uuid) -> Result<bool, QueueError>;

    /// processing -> completed with the scraped posts.
    async fn complete(&self, job_id: Uuid, posts: &[Post]) -> Result<(), QueueError>;

    /// processing -> failed with an error descriptor.
    async fn fail(&self, job_id: Uuid, message: &str) -> Result<(), QueueError>;
}

/// PostgreSQL-backed job queue.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Listen for inserted jobs. The returned receiver yields every row the
    /// insert trigger publishes until it is dropped.
    ///
    /// Notifications sent while the listener connection is down are lost, so
    /// every reconnect re-publishes the pending backlog. The claim drops the
    /// duplicates.
    pub async fn subscribe(&self) -> Result<mpsc::Receiver<Job>, QueueError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(db::JOB_INSERTED_CHANNEL).await?;
        tracing::info!(channel = db::JOB_INSERTED_CHANNEL, "Subscribed to job inserts");

        let pool = self.pool.clone();
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        tokio::spawn(async move {
            while !tx.is_closed() {
                let notification = match listener.try_recv().await {
                    Ok(Some(n)) => n,
                    Ok(None) => {
                        tracing::warn!("Job notification connection lost, resyncing pending jobs");
                        if !forward_pending(&pool, &tx).await {
                            break;
                        }
                        continue;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Job notification stream failed, retrying");
                        tokio::time::sleep(RECONNECT_DELAY).await;
                        if !forward_pending(&pool, &tx).await {
                            break;
                        }
                        continue;
                    }
                };

                match serde_json::from_str::<Job>(notification.payload()) {
                    Ok(job) => {
                        tracing::info!(job_id = %job.id, ticker = %job.ticker, "New job received");
                        if tx.send(job).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Ignoring malformed job notification");
                    }
                }
            }
        });

        Ok(rx)
    }

    /// Check database connectivity (for health checks).
    pub async fn health_check(&self) -> Result<(), QueueError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Push every pending job into the feed. Returns `false` once the receiver
/// is gone.
async fn forward_pending(pool: &PgPool, tx: &mpsc::Sender<Job>) -> bool {
    let pending = match queries::list_pending_jobs(pool).await {
        Ok(jobs) => jobs,
        Err(e) => {
            tracing::error!(error = %e, "Failed to resync pending jobs");
            return !tx.is_closed();
        }
    };

    if !pending.is_empty() {
        tracing::info!(count = pending.len(), "Re-publishing pending jobs");
    }
    for job in pending {
        if tx.send(job).await.is_err() {
            return false;
        }
    }
    true
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn list_pending(&self) -> Result<Vec<Job>, QueueError> {
        Ok(queries::list_pending_jobs(&self.pool).await?)
    }

    async fn try_claim(&self, job_id: Uuid) -> Result<bool, QueueError> {
        Ok(queries::try_claim_job(&self.pool, job_id).await?)
    }

    async fn complete(&self, job_id: Uuid, posts: &[Post]) -> Result<(), QueueError> {
        if !queries::complete_job(&self.pool, job_id, posts).await? {
            return Err(QueueError::NotProcessing(job_id));
        }
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, message: &str) -> Result<(), QueueError> {
        if !queries::fail_job(&self.pool, job_id, message).await? {
            return Err(QueueError::NotProcessing(job_id));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Job {0} is not in processing state")]
    NotProcessing(Uuid),
}
