//! Application state shared across handlers.

use sqlx::PgPool;

use parallax_db::{
    ArtifactStore, JobRepository, MediaRepository, ModelCatalogRepository, SettingsRepository,
};
use parallax_worker::{EventBus, ModelManager, ProcessingWorker};

use crate::services::Orchestrator;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub media: MediaRepository,
    pub jobs: JobRepository,
    pub catalog: ModelCatalogRepository,
    pub settings: SettingsRepository,
    pub store: ArtifactStore,
    pub bus: EventBus,
    pub models: ModelManager,
    pub worker: ProcessingWorker,
    pub orchestrator: Orchestrator,
}
