use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use parallax_core::models::{Job, JobListQuery, JobStats, JobStatus};
use parallax_core::AppError;
use parallax_worker::WorkerStatus;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// List queue items, newest first.
#[utoipa::path(
    get,
    path = "/api/queue/items",
    tag = "queue",
    params(ListQuery),
    responses(
        (status = 200, description = "Jobs", body = [Job]),
        (status = 400, description = "Bad status filter", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn list_items(
    Query(query): Query<ListQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let status: Option<JobStatus> = match query.status.as_deref() {
        Some(raw) => Some(
            raw.parse()
                .map_err(|_| AppError::InvalidInput(format!("unknown job status '{}'", raw)))?,
        ),
        None => None,
    };

    let jobs = state
        .jobs
        .list(&JobListQuery {
            status,
            limit: query.limit,
            offset: query.offset,
        })
        .await?;
    Ok(Json(jobs))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EnqueueRequest {
    pub media_id: Uuid,
    pub max_attempts: Option<i32>,
}

/// Enqueue processing for an existing media item.
#[utoipa::path(
    post,
    path = "/api/queue/items",
    tag = "queue",
    request_body = EnqueueRequest,
    responses(
        (status = 201, description = "Job queued", body = Job),
        (status = 400, description = "Already queued or processed", body = ErrorResponse),
        (status = 404, description = "Unknown media", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn enqueue_item(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EnqueueRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let job = state
        .orchestrator
        .enqueue(request.media_id, request.max_attempts)
        .await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// Aggregated queue statistics.
#[utoipa::path(
    get,
    path = "/api/queue/stats",
    tag = "queue",
    responses((status = 200, description = "Counts per status", body = JobStats))
)]
#[tracing::instrument(skip(state))]
pub async fn stats(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    Ok(Json(state.jobs.stats().await?))
}

/// Fetch one queue item.
#[utoipa::path(
    get,
    path = "/api/queue/items/{id}",
    tag = "queue",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job", body = Job),
        (status = 404, description = "Unknown job", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn get_item(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let job = state
        .jobs
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("job {} not found", id)))?;
    Ok(Json(job))
}

/// Cancel a queued job. Processing jobs cannot be interrupted.
#[utoipa::path(
    post,
    path = "/api/queue/items/{id}/cancel",
    tag = "queue",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Cancelled", body = Job),
        (status = 404, description = "Unknown job", body = ErrorResponse),
        (status = 409, description = "Job already started or finished", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn cancel_item(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    Ok(Json(state.jobs.cancel(id).await?))
}

/// Requeue a failed job with attempts reset.
#[utoipa::path(
    post,
    path = "/api/queue/items/{id}/retry",
    tag = "queue",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Requeued", body = Job),
        (status = 404, description = "Unknown job", body = ErrorResponse),
        (status = 409, description = "Job is not failed", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn retry_item(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    Ok(Json(state.jobs.retry_failed(id).await?))
}

/// Start the background worker.
#[utoipa::path(
    post,
    path = "/api/queue/worker/start",
    tag = "worker",
    responses((status = 200, description = "Worker state", body = WorkerStatus))
)]
pub async fn worker_start(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.worker.start();
    Json(state.worker.status())
}

/// Stop the background worker after the in-flight job finishes.
#[utoipa::path(
    post,
    path = "/api/queue/worker/stop",
    tag = "worker",
    responses((status = 200, description = "Worker state", body = WorkerStatus))
)]
pub async fn worker_stop(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.worker.stop().await;
    Json(state.worker.status())
}

/// Current worker state.
#[utoipa::path(
    get,
    path = "/api/queue/worker/status",
    tag = "worker",
    responses((status = 200, description = "Worker state", body = WorkerStatus))
)]
pub async fn worker_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.worker.status())
}
