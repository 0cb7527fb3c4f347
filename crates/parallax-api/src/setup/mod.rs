//! Application initialization: database, services, routes.

pub mod database;
pub mod routes;
pub mod server;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;

use parallax_core::Config;
use parallax_db::{
    ArtifactStore, JobRepository, MediaRepository, ModelCatalogRepository, SettingsRepository,
};
use parallax_db::db::ArtifactRepository;
use parallax_services::{InferenceClient, LibraryClient};
use parallax_storage::ArtifactRoot;
use parallax_worker::{
    EventBus, IdleTimeouts, ModelManager, ProcessingWorker, WorkerConfig,
};

use crate::services::{spawn_cache_writer, Orchestrator};
use crate::state::AppState;

/// Wire the whole application together and return its shared state + router.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, Router)> {
    let pool = database::setup_database(&config).await?;

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("creating upload dir {}", config.upload_dir.display()))?;
    let artifact_root = ArtifactRoot::new(config.artifact_dir.clone())
        .await
        .context("creating artifact root")?;

    let media = MediaRepository::new(pool.clone());
    let jobs = JobRepository::new(pool.clone());
    let catalog = ModelCatalogRepository::new(pool.clone());
    let settings = SettingsRepository::new(pool.clone());
    let store = ArtifactStore::new(ArtifactRepository::new(pool.clone()), artifact_root);

    let inference = InferenceClient::new(config.ai_service_url.clone())
        .context("creating inference client")?;
    let library = match config.library() {
        Some((url, key)) => {
            Some(LibraryClient::new(url, key).context("creating library client")?)
        }
        None => {
            tracing::info!("No media library configured; external imports disabled");
            None
        }
    };

    let bus = EventBus::new(config.event_bus_capacity);
    let models = ModelManager::new(
        catalog.clone(),
        inference.clone(),
        bus.clone(),
        IdleTimeouts {
            auto: config.model_timeout_auto,
            manual: config.model_timeout_manual,
        },
    );

    let cache_tx = spawn_cache_writer(media.clone(), store.clone(), config.cache_write_queue);
    let orchestrator = Orchestrator::new(
        media.clone(),
        jobs.clone(),
        store.clone(),
        inference.clone(),
        library.clone(),
        models.clone(),
        cache_tx,
        config.upload_dir.clone(),
    );

    let worker = ProcessingWorker::new(
        jobs.clone(),
        media.clone(),
        settings.clone(),
        store.clone(),
        inference.clone(),
        library.clone(),
        models.clone(),
        bus.clone(),
        WorkerConfig {
            tick: config.worker_tick,
            experimental_video: config.experimental_video,
            default_model: config.default_model.clone(),
        },
    );

    let state = Arc::new(AppState {
        pool,
        media,
        jobs,
        catalog,
        settings,
        store,
        bus,
        models,
        worker,
        orchestrator,
    });

    let router = routes::setup_routes(&config, state.clone());
    Ok((state, router))
}
