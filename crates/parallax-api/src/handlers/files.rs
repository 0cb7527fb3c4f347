use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use parallax_core::models::{Artifact, Media};
use parallax_core::AppError;

use crate::error::{ErrorResponse, HttpAppError};
use crate::services::GenerateTarget;
use crate::state::AppState;

async fn resolve_media(state: &AppState, id: &str) -> Result<Media, AppError> {
    match GenerateTarget::parse(id) {
        GenerateTarget::Media(media_id) => state
            .media
            .get(media_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("media {} not found", media_id))),
        GenerateTarget::External(external_id) => state
            .media
            .get_by_external_id(&external_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("no media imported for asset '{}'", external_id))
            }),
    }
}

/// List generated artifacts for an asset.
#[utoipa::path(
    get,
    path = "/api/assets/{id}/files",
    tag = "files",
    params(("id" = String, Path, description = "Media UUID or external asset id")),
    responses(
        (status = 200, description = "Artifact descriptors", body = [Artifact]),
        (status = 404, description = "Unknown media", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn list_files(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let media = resolve_media(&state, &id).await?;
    let artifacts = state.store.list_by_media(media.id).await?;
    Ok(Json(artifacts))
}

/// Delete one artifact (row first, file best-effort).
#[utoipa::path(
    delete,
    path = "/api/assets/{id}/files/{file_id}",
    tag = "files",
    params(
        ("id" = String, Path, description = "Media UUID or external asset id"),
        ("file_id" = Uuid, Path, description = "Artifact ID")
    ),
    responses(
        (status = 204, description = "Artifact removed"),
        (status = 404, description = "Unknown media or artifact", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn delete_file(
    Path((id, file_id)): Path<(String, Uuid)>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let media = resolve_media(&state, &id).await?;
    let artifact = state
        .store
        .get(file_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("artifact {} not found", file_id)))?;
    if artifact.media_id != media.id {
        return Err(AppError::NotFound(format!(
            "artifact {} does not belong to media {}",
            file_id, media.id
        ))
        .into());
    }

    state.store.delete(file_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
