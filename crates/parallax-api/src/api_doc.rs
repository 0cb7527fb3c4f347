//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use parallax_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Parallax API",
        version = "0.1.0",
        description = "Photo-to-3D artifact orchestration: depth maps and splats generated \
                       through an external inference service, cached per (media, kind, model)."
    ),
    paths(
        handlers::health::health,
        handlers::media::upload,
        handlers::media::get_artifact,
        handlers::generate::generate,
        handlers::files::list_files,
        handlers::files::delete_file,
        handlers::queue::list_items,
        handlers::queue::enqueue_item,
        handlers::queue::stats,
        handlers::queue::get_item,
        handlers::queue::cancel_item,
        handlers::queue::retry_item,
        handlers::queue::worker_start,
        handlers::queue::worker_stop,
        handlers::queue::worker_status,
        handlers::settings::get_settings,
        handlers::settings::update_settings,
        handlers::settings::list_models,
        handlers::settings::download_model,
        handlers::settings::load_model,
        handlers::settings::unload_model,
        handlers::events::subscribe,
    ),
    components(schemas(
        error::ErrorResponse,
        handlers::media::UploadResponse,
        handlers::generate::GenerateRequest,
        handlers::queue::EnqueueRequest,
        handlers::settings::ModelWithRuntime,
        handlers::settings::LoadModelRequest,
        models::Job,
        models::JobStatus,
        models::JobStats,
        models::Artifact,
        models::AssetKind,
        models::ArtifactFormat,
        models::ModelDescriptor,
        models::DownloadStatus,
        models::UserSettings,
        models::UpdateSettings,
        parallax_worker::WorkerStatus,
    )),
    tags(
        (name = "health", description = "Liveness"),
        (name = "media", description = "Uploads and cached artifacts"),
        (name = "generate", description = "On-demand generation"),
        (name = "files", description = "Artifact management"),
        (name = "queue", description = "Processing queue"),
        (name = "worker", description = "Worker control"),
        (name = "settings", description = "Preferences and model catalog"),
        (name = "events", description = "Realtime updates"),
    )
)]
pub struct ApiDoc;
