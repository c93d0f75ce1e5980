use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::job::{Job, JobResults, JobStatus};
use crate::models::post::Post;

const JOB_COLUMNS: &str = "id, ticker, status, results, created_at, started_at, completed_at";

fn job_from_row(row: &PgRow) -> Result<Job, sqlx::Error> {
    let status_str: String = row.try_get("status")?;
    let status =
        JobStatus::from_str(&status_str).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    let results: Option<Json<JobResults>> = row.try_get("results")?;

    Ok(Job {
        id: row.try_get("id")?,
        ticker: row.try_get("ticker")?,
        status,
        results: results.map(|Json(r)| r),
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

/// Insert a new pending job
pub async fn create_job(pool: &PgPool, ticker: &str) -> Result<Job, sqlx::Error> {
    let row = sqlx::query(&format!(
        "INSERT INTO jobs (ticker) VALUES ($1) RETURNING {JOB_COLUMNS}"
    ))
    .bind(ticker)
    .fetch_one(pool)
    .await?;

    job_from_row(&row)
}

/// Get a job by ID
pub async fn get_job(pool: &PgPool, job_id: Uuid) -> Result<Option<Job>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
        .bind(job_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// All pending jobs, oldest first
pub async fn list_pending_jobs(pool: &PgPool) -> Result<Vec<Job>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {JOB_COLUMNS}
        FROM jobs
        WHERE status = 'pending'
        ORDER BY created_at ASC
        "#
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(job_from_row).collect()
}

/// Move a job from pending to processing. Returns false when the job was not
/// pending anymore (someone else claimed it, or it is unknown).
pub async fn try_claim_job(pool: &PgPool, job_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET status = 'processing',
            started_at = NOW()
        WHERE id = $1 AND status = 'pending'
        "#,
    )
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Terminal write shared by complete and fail. Only a processing job can be
/// finished, so completed_at is set once.
async fn finish_job(
    pool: &PgPool,
    job_id: Uuid,
    status: JobStatus,
    results: &JobResults,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET status = $1,
            results = $2,
            completed_at = NOW()
        WHERE id = $3 AND status = 'processing'
        "#,
    )
    .bind(status.as_ref())
    .bind(Json(results))
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Store scraped posts and mark the job completed
pub async fn complete_job(pool: &PgPool, job_id: Uuid, posts: &[Post]) -> Result<bool, sqlx::Error> {
    let results = JobResults::Posts(posts.to_vec());
    finish_job(pool, job_id, JobStatus::Completed, &results).await
}

/// Store the error descriptor and mark the job failed
pub async fn fail_job(pool: &PgPool, job_id: Uuid, message: &str) -> Result<bool, sqlx::Error> {
    let results = JobResults::Error {
        error: message.to_string(),
    };
    finish_job(pool, job_id, JobStatus::Failed, &results).await
}
