use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderName, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use parallax_core::models::AssetKind;
use parallax_core::AppError;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

/// Response header reporting whether the artifact came from the cache.
pub const CACHE_HEADER: HeaderName = HeaderName::from_static("cache");

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub media_id: Uuid,
    pub job_id: Uuid,
}

/// Upload a photo (or video) and enqueue background processing.
#[utoipa::path(
    post,
    path = "/api/media/upload",
    tag = "media",
    responses(
        (status = 201, description = "Uploaded and enqueued", body = UploadResponse),
        (status = 400, description = "Missing file or unsupported type", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart))]
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("invalid multipart body: {}", e)))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let mime = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidInput(format!("failed to read upload: {}", e)))?;

        let (media, job) = state.orchestrator.upload(bytes, &filename, &mime).await?;
        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                media_id: media.id,
                job_id: job.id,
            }),
        ));
    }

    Err(AppError::InvalidInput("no file field in upload".to_string()).into())
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct ArtifactQuery {
    /// Asset kind; defaults to depth.
    pub kind: Option<String>,
    /// Model key; defaults to the NULL (model-less) slot.
    pub model: Option<String>,
}

/// Fetch a cached artifact for a media item. Never triggers generation.
#[utoipa::path(
    get,
    path = "/api/media/{id}/artifact",
    tag = "media",
    params(("id" = Uuid, Path, description = "Media ID"), ArtifactQuery),
    responses(
        (status = 200, description = "Artifact bytes"),
        (status = 404, description = "No artifact cached", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn get_artifact(
    Path(id): Path<Uuid>,
    Query(query): Query<ArtifactQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let kind: AssetKind = match query.kind.as_deref() {
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::InvalidInput(format!("unknown asset kind '{}'", raw)))?,
        None => AssetKind::Depth,
    };

    let artifact = state
        .store
        .lookup(id, kind, query.model.as_deref())
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("no {} artifact cached for media {}", kind, id))
        })?;
    let bytes = state.store.read_bytes(&artifact).await?;

    Ok((
        [
            (header::CONTENT_TYPE, artifact.format.content_type()),
            (CACHE_HEADER, "hit"),
        ],
        bytes,
    ))
}
