use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use utoipa::ToSchema;

use parallax_core::models::{
    LoadTrigger, ModelDescriptor, UpdateSettings, UserSettings, DEFAULT_MODEL_KEY,
};
use parallax_core::AppError;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

/// Current preferences, or defaults when none are stored yet.
#[utoipa::path(
    get,
    path = "/api/settings",
    tag = "settings",
    responses((status = 200, description = "Preferences", body = UserSettings))
)]
#[tracing::instrument(skip(state))]
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    match state.settings.get().await? {
        Some(settings) => Ok(Json(settings).into_response()),
        None => Ok(Json(json!({
            "default_model": DEFAULT_MODEL_KEY,
            "auto_generate_on_view": false,
        }))
        .into_response()),
    }
}

/// Update preferences. The default model must exist in the catalog.
#[utoipa::path(
    put,
    path = "/api/settings",
    tag = "settings",
    request_body = UpdateSettings,
    responses(
        (status = 200, description = "Stored preferences", body = UserSettings),
        (status = 400, description = "Unknown model key", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, update))]
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(update): Json<UpdateSettings>,
) -> Result<impl IntoResponse, HttpAppError> {
    if let Some(model_key) = update.default_model.as_deref() {
        state
            .catalog
            .get(model_key)
            .await?
            .ok_or_else(|| AppError::InvalidInput(format!("unknown model '{}'", model_key)))?;
    }

    Ok(Json(state.settings.update(&update).await?))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ModelWithRuntime {
    #[serde(flatten)]
    pub descriptor: ModelDescriptor,
    pub is_loaded: bool,
}

/// Model catalog with live residency flags.
#[utoipa::path(
    get,
    path = "/api/settings/models",
    tag = "settings",
    responses((status = 200, description = "Models", body = [ModelWithRuntime]))
)]
#[tracing::instrument(skip(state))]
pub async fn list_models(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let current = state.models.current_model();
    let models = state
        .catalog
        .list()
        .await?
        .into_iter()
        .map(|descriptor| ModelWithRuntime {
            is_loaded: current.as_deref() == Some(descriptor.model_key.as_str()),
            descriptor,
        })
        .collect::<Vec<_>>();
    Ok(Json(models))
}

/// Start a model download; progress streams on `model:download-progress`.
#[utoipa::path(
    post,
    path = "/api/settings/models/{key}/download",
    tag = "settings",
    params(("key" = String, Path, description = "Model key")),
    responses(
        (status = 202, description = "Download started"),
        (status = 400, description = "Unknown model", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn download_model(
    Path(key): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    state
        .catalog
        .get(&key)
        .await?
        .ok_or_else(|| AppError::InvalidInput(format!("unknown model '{}'", key)))?;

    // Long-running; progress and completion are reported over the event bus.
    let models = state.models.clone();
    tokio::spawn(async move {
        if let Err(e) = models.download(&key).await {
            tracing::error!(model_key = %key, error = %e, "Model download failed");
        }
    });

    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "downloading" }))))
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LoadModelRequest {
    pub device: Option<String>,
}

/// Load a model now (manual trigger: short idle window).
#[utoipa::path(
    post,
    path = "/api/settings/models/{key}/load",
    tag = "settings",
    params(("key" = String, Path, description = "Model key")),
    request_body = LoadModelRequest,
    responses(
        (status = 200, description = "Loaded"),
        (status = 400, description = "Unknown model", body = ErrorResponse),
        (status = 409, description = "Model not downloaded", body = ErrorResponse),
        (status = 503, description = "Inference service unreachable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request))]
pub async fn load_model(
    Path(key): Path<String>,
    State(state): State<Arc<AppState>>,
    request: Option<Json<LoadModelRequest>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    state
        .models
        .ensure_loaded(&key, LoadTrigger::Manual, request.device.as_deref())
        .await?;
    Ok(Json(state.models.snapshot()))
}

/// Unload a model, including zombie residency this process never created.
#[utoipa::path(
    post,
    path = "/api/settings/models/{key}/unload",
    tag = "settings",
    params(("key" = String, Path, description = "Model key")),
    responses(
        (status = 200, description = "Unloaded"),
        (status = 503, description = "Inference service unreachable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn unload_model(
    Path(key): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    state.models.unload(Some(&key)).await?;
    Ok(Json(state.models.snapshot()))
}
