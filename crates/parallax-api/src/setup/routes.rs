//! Route configuration and setup

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{delete, get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use parallax_core::Config;

use crate::api_doc::ApiDoc;
use crate::handlers;
use crate::state::AppState;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Router {
    let cors = setup_cors(config);

    let api = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/media/upload", post(handlers::media::upload))
        .route(
            "/api/media/{id}/artifact",
            get(handlers::media::get_artifact),
        )
        .route("/api/assets/{id}/generate", post(handlers::generate::generate))
        .route("/api/assets/{id}/files", get(handlers::files::list_files))
        .route(
            "/api/assets/{id}/files/{file_id}",
            delete(handlers::files::delete_file),
        )
        .route(
            "/api/queue/items",
            get(handlers::queue::list_items).post(handlers::queue::enqueue_item),
        )
        .route("/api/queue/stats", get(handlers::queue::stats))
        .route("/api/queue/items/{id}", get(handlers::queue::get_item))
        .route(
            "/api/queue/items/{id}/cancel",
            post(handlers::queue::cancel_item),
        )
        .route(
            "/api/queue/items/{id}/retry",
            post(handlers::queue::retry_item),
        )
        .route(
            "/api/queue/worker/start",
            post(handlers::queue::worker_start),
        )
        .route("/api/queue/worker/stop", post(handlers::queue::worker_stop))
        .route(
            "/api/queue/worker/status",
            get(handlers::queue::worker_status),
        )
        .route(
            "/api/settings",
            get(handlers::settings::get_settings).put(handlers::settings::update_settings),
        )
        .route("/api/settings/models", get(handlers::settings::list_models))
        .route(
            "/api/settings/models/{key}/download",
            post(handlers::settings::download_model),
        )
        .route(
            "/api/settings/models/{key}/load",
            post(handlers::settings::load_model),
        )
        .route(
            "/api/settings/models/{key}/unload",
            post(handlers::settings::unload_model),
        )
        .route("/api/events", get(handlers::events::subscribe))
        .with_state(state);

    api.route(
        "/api/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
    .nest(
        "/docs",
        utoipa_rapidoc::RapiDoc::new("/api/openapi.json")
            .path("/docs")
            .into(),
    )
    .layer(DefaultBodyLimit::max(config.max_upload_size_bytes))
    .layer(cors)
    .layer(TraceLayer::new_for_http())
}

fn setup_cors(config: &Config) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::PUT, Method::DELETE];
    if config.cors_origins.iter().any(|origin| origin == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    }
}
