// src/api/handlers.rs

use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use super::types::{BuildAccepted, BuildRequest, ErrorResponse, JobView};
use super::ApiState;
use crate::core::types::JobRecord;
use crate::infra::errors::ModelForgeError;

type ApiError = (StatusCode, Json<ErrorResponse>);

/// POST /api/v1/models — submit a build request.
pub async fn submit(
    State(state): State<ApiState>,
    Json(body): Json<BuildRequest>,
) -> Result<(StatusCode, Json<BuildAccepted>), ApiError> {
    if body.intent.trim().is_empty() {
        return Err(bad_request("Intent cannot be empty"));
    }

    let max_iterations = body.max_iterations.unwrap_or(state.defaults.max_iterations);
    if max_iterations == 0 {
        return Err(bad_request("max_iterations must be at least 1"));
    }
    let timeout = body
        .timeout_seconds
        .map(Duration::from_secs)
        .unwrap_or(state.defaults.timeout);
    if timeout.is_zero() {
        return Err(bad_request("timeout_seconds must be at least 1"));
    }

    let job = JobRecord::new(body.intent, max_iterations, timeout);
    let job_id = job.id.clone();
    let status = job.status;

    state
        .store
        .insert(job)
        .await
        .map_err(|e| internal(state.debug, e))?;
    state
        .queue
        .push(&job_id)
        .await
        .map_err(|e| internal(state.debug, e))?;

    tracing::info!(job_id = %job_id, "Build request accepted");
    Ok((StatusCode::CREATED, Json(BuildAccepted { job_id, status })))
}

/// GET /api/v1/models — list jobs.
pub async fn list(State(state): State<ApiState>) -> Result<Json<Vec<JobView>>, ApiError> {
    let jobs = state
        .store
        .list()
        .await
        .map_err(|e| internal(state.debug, e))?;
    Ok(Json(jobs.into_iter().map(JobView::from).collect()))
}

/// GET /api/v1/models/{id} — job status view.
pub async fn get(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<JobView>, ApiError> {
    match state.store.load(&id).await {
        Ok(job) => Ok(Json(JobView::from(job))),
        Err(ModelForgeError::NotFound { .. }) => Err(not_found(&id)),
        Err(e) => Err(internal(state.debug, e)),
    }
}

/// POST /api/v1/models/{id}/cancel — cooperative cancellation; the job stops
/// at its next checkpoint boundary, never mid-iteration.
pub async fn cancel(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match state.store.request_cancel(&id).await {
        Ok(()) => Ok(Json(serde_json::json!({
            "job_id": id,
            "status": "cancel_requested",
        }))),
        Err(ModelForgeError::NotFound { .. }) => Err(not_found(&id)),
        Err(e) => Err(internal(state.debug, e)),
    }
}

/// GET /api/v1/health — simple health check.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn not_found(id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("Job '{id}' not found"),
        }),
    )
}

fn internal(debug: bool, e: ModelForgeError) -> ApiError {
    tracing::error!("Internal error serving API request: {e}");
    let error = if debug {
        e.to_string()
    } else {
        "Internal error".into()
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error }))
}
