use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use parallax_core::models::AssetKind;
use parallax_core::AppError;

use crate::error::{ErrorResponse, HttpAppError};
use crate::handlers::media::CACHE_HEADER;
use crate::services::GenerateTarget;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct GenerateRequest {
    /// Asset kind to produce; defaults to depth.
    #[serde(rename = "type")]
    pub asset_type: Option<String>,
    /// Model key; defaults to the configured default model.
    #[serde(rename = "modelKey")]
    pub model_key: Option<String>,
}

/// Generate an artifact right now for an actively viewed asset.
///
/// The path id may be an internal media UUID or an external library asset
/// id. Cache hits are answered without touching the inference service; the
/// `cache` response header says which case happened.
#[utoipa::path(
    post,
    path = "/api/assets/{id}/generate",
    tag = "generate",
    params(("id" = String, Path, description = "Media UUID or external asset id")),
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Artifact bytes, cache header hit/miss"),
        (status = 400, description = "Unknown kind or model", body = ErrorResponse),
        (status = 404, description = "Unknown media", body = ErrorResponse),
        (status = 503, description = "Inference service unreachable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request))]
pub async fn generate(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    request: Option<Json<GenerateRequest>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();

    let kind: AssetKind = match request.asset_type.as_deref() {
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::InvalidInput(format!("unknown asset kind '{}'", raw)))?,
        None => AssetKind::Depth,
    };

    let model_key = match request.model_key {
        Some(model_key) => model_key,
        None => state.settings.default_model().await?,
    };

    let generated = state
        .orchestrator
        .generate_on_demand(GenerateTarget::parse(&id), kind, &model_key)
        .await?;

    let cache_state = if generated.cached { "hit" } else { "miss" };
    Ok((
        [
            (header::CONTENT_TYPE, generated.format.content_type()),
            (CACHE_HEADER, cache_state),
        ],
        generated.bytes,
    ))
}
