use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::queries;
use crate::models::submission::{JobStatusResponse, SubmitJobRequest, SubmitJobResponse};

/// POST /api/v1/jobs — queue a ticker search.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<SubmitJobRequest>,
) -> Result<(StatusCode, Json<SubmitJobResponse>), StatusCode> {
    let request = request.normalized();
    if let Err(report) = request.validate() {
        tracing::debug!(error = %report, "Rejected job submission");
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let job = queries::create_job(&state.db, &request.ticker)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create job");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    metrics::counter!("scrape_jobs_submitted_total").increment(1);
    tracing::info!(job_id = %job.id, ticker = %job.ticker, "Job submitted");

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitJobResponse {
            job_id: job.id,
            ticker: job.ticker,
            status: job.status,
        }),
    ))
}

/// GET /api/v1/jobs/{job_id} — job status and results.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, StatusCode> {
    let job = queries::get_job(&state.db, job_id)
        .await
        .map_err(|e| {
            tracing::error!(job_id = %job_id, error = %e, "Failed to load job");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(job.into()))
}
