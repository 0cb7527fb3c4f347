//! Single-flight processing worker.
//!
//! Drains the job queue sequentially: claim, ensure the default model is
//! resident, run depth inference per source variant, store the artifacts,
//! and record the outcome. Retry policy lives entirely in `mark_failed`;
//! within one claim the worker never retries.

use bytes::Bytes;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use uuid::Uuid;

use parallax_core::events::{BusEvent, JobCompleteEvent, JobProgressEvent, QueueUpdateEvent};
use parallax_core::models::{
    AssetKind, ArtifactFormat, Job, JobStatus, LoadTrigger, Media, VariantLabel,
};
use parallax_core::{AppError, ErrorMetadata};
use parallax_db::{ArtifactStore, JobRepository, MediaRepository, PutArtifact, SettingsRepository};
use parallax_services::{probe_dimensions, InferenceClient, LibraryClient};

use crate::bus::EventBus;
use crate::model_manager::ModelManager;

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Sleep between claim attempts when the queue is empty.
    pub tick: Duration,
    /// Video jobs fail immediately unless enabled.
    pub experimental_video: bool,
    /// Fallback model when settings are unavailable.
    pub default_model: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(5),
            experimental_video: false,
            default_model: "base".to_string(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub struct WorkerStatus {
    pub running: bool,
    pub current_job: Option<Uuid>,
}

struct WorkerInner {
    jobs: JobRepository,
    media: MediaRepository,
    settings: SettingsRepository,
    store: ArtifactStore,
    inference: InferenceClient,
    library: Option<LibraryClient>,
    models: ModelManager,
    bus: EventBus,
    config: WorkerConfig,
    running: AtomicBool,
    current_job: Mutex<Option<Uuid>>,
    shutdown_tx: Mutex<Option<mpsc::Sender<()>>>,
}

#[derive(Clone)]
pub struct ProcessingWorker {
    inner: Arc<WorkerInner>,
}

impl ProcessingWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        jobs: JobRepository,
        media: MediaRepository,
        settings: SettingsRepository,
        store: ArtifactStore,
        inference: InferenceClient,
        library: Option<LibraryClient>,
        models: ModelManager,
        bus: EventBus,
        config: WorkerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(WorkerInner {
                jobs,
                media,
                settings,
                store,
                inference,
                library,
                models,
                bus,
                config,
                running: AtomicBool::new(false),
                current_job: Mutex::new(None),
                shutdown_tx: Mutex::new(None),
            }),
        }
    }

    /// Start the claim loop. A no-op when already running.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            tracing::debug!("Worker already running");
            return;
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        *self
            .inner
            .shutdown_tx
            .lock()
            .expect("worker shutdown lock poisoned") = Some(shutdown_tx);

        let worker = self.clone();
        tokio::spawn(async move {
            worker.run_loop(shutdown_rx).await;
        });

        tracing::info!(tick_ms = self.inner.config.tick.as_millis() as u64, "Worker started");
    }

    /// Signal the loop to stop after the in-flight job, if any, completes.
    pub async fn stop(&self) {
        let tx = self
            .inner
            .shutdown_tx
            .lock()
            .expect("worker shutdown lock poisoned")
            .take();
        if let Some(tx) = tx {
            let _ = tx.send(()).await;
            tracing::info!("Worker stop requested");
        }
    }

    pub fn status(&self) -> WorkerStatus {
        WorkerStatus {
            running: self.inner.running.load(Ordering::SeqCst),
            current_job: *self
                .inner
                .current_job
                .lock()
                .expect("worker job lock poisoned"),
        }
    }

    async fn run_loop(&self, mut shutdown_rx: mpsc::Receiver<()>) {
        loop {
            match self.inner.jobs.claim_next().await {
                Ok(Some(job)) => {
                    self.process_job(job).await;
                    // Between jobs, a pending stop wins over the next claim.
                    if shutdown_rx.try_recv().is_ok() {
                        break;
                    }
                }
                Ok(None) => {
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = sleep(self.inner.config.tick) => {}
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim next job");
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = sleep(self.inner.config.tick) => {}
                    }
                }
            }
        }

        self.inner.running.store(false, Ordering::SeqCst);
        tracing::info!("Worker stopped");
    }

    #[tracing::instrument(skip(self, job), fields(job_id = %job.id, media_id = %job.media_id, attempt = job.attempts))]
    async fn process_job(&self, job: Job) {
        *self
            .inner
            .current_job
            .lock()
            .expect("worker job lock poisoned") = Some(job.id);
        self.publish_queue_update(Some(job.id)).await;
        self.publish_progress(&job, "claimed", 0);

        let started = std::time::Instant::now();
        let outcome = self.run_job(&job).await;
        let duration_ms = started.elapsed().as_millis() as i64;

        match outcome {
            JobOutcome::Succeeded { model_key } => {
                if let Err(e) = self.inner.jobs.mark_completed(job.id, duration_ms).await {
                    tracing::error!(job_id = %job.id, error = %e, "Failed to mark job completed");
                }
                self.publish_complete(&job, true, Some(model_key));
            }
            JobOutcome::Failed { message, retryable } => {
                if retryable {
                    match self.inner.jobs.mark_failed(job.id, &message).await {
                        Ok(decision) if decision.retry => {
                            tracing::info!(
                                job_id = %job.id,
                                attempts = decision.attempts,
                                max_attempts = decision.max_attempts,
                                "Job requeued for retry"
                            );
                        }
                        Ok(_) => self.publish_complete(&job, false, None),
                        Err(e) => {
                            tracing::error!(job_id = %job.id, error = %e, "Failed to mark job failed");
                        }
                    }
                } else {
                    if let Err(e) = self.inner.jobs.fail_permanently(job.id, &message).await {
                        tracing::error!(job_id = %job.id, error = %e, "Failed to fail job");
                    }
                    self.publish_complete(&job, false, None);
                }
            }
        }

        *self
            .inner
            .current_job
            .lock()
            .expect("worker job lock poisoned") = None;
        self.publish_queue_update(None).await;
    }

    async fn run_job(&self, job: &Job) -> JobOutcome {
        let media = match self.inner.media.get(job.media_id).await {
            Ok(Some(media)) => media,
            Ok(None) => {
                return JobOutcome::Failed {
                    message: format!("media {} no longer exists", job.media_id),
                    retryable: false,
                }
            }
            Err(e) => return JobOutcome::from_error(&e),
        };

        if media.kind == parallax_core::models::MediaKind::Video
            && !self.inner.config.experimental_video
        {
            return JobOutcome::Failed {
                message: "video processing disabled".to_string(),
                retryable: false,
            };
        }

        let model_key = match self.inner.settings.default_model().await {
            Ok(model) => model,
            Err(e) => {
                tracing::warn!(error = %e, "Settings unavailable, using configured default model");
                self.inner.config.default_model.clone()
            }
        };

        if let Err(e) = self
            .inner
            .models
            .ensure_loaded(&model_key, LoadTrigger::Auto, None)
            .await
        {
            return JobOutcome::from_error(&e);
        }

        let variants = variant_plan(media.is_external() && self.inner.library.is_some());
        let mut succeeded = 0usize;
        let mut errors: Vec<(VariantLabel, AppError)> = Vec::new();

        for (index, &variant) in variants.iter().enumerate() {
            let progress = (20 + 70 * index / variants.len()) as u8;
            self.publish_progress(job, &variant.to_string(), progress);

            match self.process_variant(job, &media, &model_key, variant).await {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    tracing::warn!(
                        job_id = %job.id,
                        variant = %variant,
                        error = %e,
                        "Variant processing failed"
                    );
                    errors.push((variant, e));
                }
            }
        }

        self.inner.models.register_activity(LoadTrigger::Auto);

        // Partial success is success; remaining variants can be regenerated
        // on demand.
        if succeeded > 0 {
            return JobOutcome::Succeeded { model_key };
        }

        let retryable = errors.iter().any(|(_, e)| e.is_retryable());
        JobOutcome::Failed {
            message: join_errors(&errors),
            retryable,
        }
    }

    async fn process_variant(
        &self,
        job: &Job,
        media: &Media,
        model_key: &str,
        variant: VariantLabel,
    ) -> Result<(), AppError> {
        let source = self.fetch_source(media, variant).await?;

        // Backfill source dimensions the first time we see full-resolution bytes.
        if media.width.is_none() && variant == VariantLabel::FullResolution {
            if let Some((w, h)) = probe_dimensions(&source) {
                if let Err(e) = self
                    .inner
                    .media
                    .update_dimensions(media.id, w as i32, h as i32)
                    .await
                {
                    tracing::debug!(media_id = %media.id, error = %e, "Dimension backfill failed");
                }
            }
        }

        let depth = self
            .inner
            .inference
            .process_depth(source, Some(model_key))
            .await?;

        let (width, height) = match probe_dimensions(&depth) {
            Some((w, h)) => (Some(w as i32), Some(h as i32)),
            None => (None, None),
        };

        self.inner
            .store
            .put(PutArtifact {
                media_id: media.id,
                base_name: file_stem(&media.original_filename),
                kind: AssetKind::Depth,
                model_key: Some(model_key.to_string()),
                format: ArtifactFormat::Png,
                bytes: depth,
                width,
                height,
                metadata: json!({
                    "variant": variant.to_string(),
                    "job_id": job.id,
                }),
            })
            .await?;

        Ok(())
    }

    async fn fetch_source(
        &self,
        media: &Media,
        variant: VariantLabel,
    ) -> Result<Bytes, AppError> {
        if let Some(external_id) = media.external_id.as_deref() {
            if let Some(library) = &self.inner.library {
                return match variant {
                    VariantLabel::Thumbnail => library.thumbnail(external_id, "jpeg", "preview").await,
                    VariantLabel::FullResolution => library.original(external_id).await,
                };
            }
        }

        let path = media.file_path.as_deref().ok_or_else(|| {
            AppError::Internal(format!("media {} has no source path", media.id))
        })?;
        Ok(Bytes::from(tokio::fs::read(path).await.map_err(|e| {
            AppError::Storage(format!("failed to read source file {}: {}", path, e))
        })?))
    }

    fn publish_progress(&self, job: &Job, stage: &str, progress: u8) {
        self.inner.bus.publish(BusEvent::JobProgress(JobProgressEvent {
            job_id: job.id,
            media_id: job.media_id,
            stage: stage.to_string(),
            progress,
            status: JobStatus::Processing,
        }));
    }

    fn publish_complete(&self, job: &Job, success: bool, model_key: Option<String>) {
        self.inner.bus.publish(BusEvent::JobComplete(JobCompleteEvent {
            job_id: job.id,
            media_id: job.media_id,
            success,
            artifact_kind: success.then_some(AssetKind::Depth),
            model_key,
            cached: false,
        }));
    }

    async fn publish_queue_update(&self, current: Option<Uuid>) {
        let length = match self.inner.jobs.stats().await {
            Ok(stats) => stats.queued,
            Err(e) => {
                tracing::debug!(error = %e, "Queue stats unavailable for event");
                return;
            }
        };
        self.inner.bus.publish(BusEvent::QueueUpdate(QueueUpdateEvent {
            length,
            current,
            processing: current.is_some(),
        }));
    }
}

enum JobOutcome {
    Succeeded { model_key: String },
    Failed { message: String, retryable: bool },
}

impl JobOutcome {
    fn from_error(error: &AppError) -> Self {
        JobOutcome::Failed {
            message: error.to_string(),
            retryable: error.is_retryable(),
        }
    }
}

/// Which source variants a job processes, thumbnail first. Uploads have no
/// thumbnail rendition, so they process full resolution only.
fn variant_plan(has_library_source: bool) -> &'static [VariantLabel] {
    if has_library_source {
        &[VariantLabel::Thumbnail, VariantLabel::FullResolution]
    } else {
        &[VariantLabel::FullResolution]
    }
}

fn file_stem(filename: &str) -> String {
    std::path::Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}

fn join_errors(errors: &[(VariantLabel, AppError)]) -> String {
    errors
        .iter()
        .map(|(variant, error)| format!("{}: {}", variant, error))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_plan_prefers_thumbnail_for_library_media() {
        assert_eq!(
            variant_plan(true),
            &[VariantLabel::Thumbnail, VariantLabel::FullResolution]
        );
        assert_eq!(variant_plan(false), &[VariantLabel::FullResolution]);
    }

    #[test]
    fn file_stem_strips_extension() {
        assert_eq!(file_stem("sunset.jpg"), "sunset");
        assert_eq!(file_stem("archive.tar.gz"), "archive.tar");
        assert_eq!(file_stem("noext"), "noext");
    }

    #[test]
    fn join_errors_labels_variants() {
        let errors = vec![
            (
                VariantLabel::Thumbnail,
                AppError::Timeout {
                    operation: "process_depth".to_string(),
                },
            ),
            (
                VariantLabel::FullResolution,
                AppError::Remote {
                    status: 503,
                    message: "busy".to_string(),
                },
            ),
        ];
        let joined = join_errors(&errors);
        assert!(joined.contains("thumbnail:"));
        assert!(joined.contains("full_resolution:"));
        assert!(joined.contains("503"));
    }

    #[test]
    fn outcome_retryability_follows_error_taxonomy() {
        let timeout = JobOutcome::from_error(&AppError::Timeout {
            operation: "x".to_string(),
        });
        assert!(matches!(timeout, JobOutcome::Failed { retryable: true, .. }));

        let bad_input = JobOutcome::from_error(&AppError::Remote {
            status: 400,
            message: "bad image".to_string(),
        });
        assert!(matches!(
            bad_input,
            JobOutcome::Failed { retryable: false, .. }
        ));
    }
}
