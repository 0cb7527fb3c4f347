//! Orchestration operations driven by the REST facade.
//!
//! Upload and import create a Media and enqueue a job; on-demand generation
//! answers from the artifact cache when it can and otherwise runs inference
//! synchronously, caching the result off the request path.

use bytes::Bytes;
use std::path::PathBuf;
use tokio::sync::mpsc;
use uuid::Uuid;

use parallax_core::models::{
    ArtifactFormat, AssetKind, Job, LoadTrigger, Media, MediaKind, MediaSource, NewMedia,
};
use parallax_core::AppError;
use parallax_db::{ArtifactStore, JobRepository, MediaRepository};
use parallax_services::{probe_dimensions, InferenceClient, LibraryClient};
use parallax_storage::sanitize_file_stem;
use parallax_worker::ModelManager;

use super::cache_writer::CacheWrite;

const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// What an on-demand request is pointed at.
#[derive(Debug, Clone)]
pub enum GenerateTarget {
    /// An internal media id.
    Media(Uuid),
    /// An external library asset id, possibly never seen before.
    External(String),
}

impl GenerateTarget {
    /// Path ids that parse as UUIDs are internal; everything else refers to
    /// the external library.
    pub fn parse(id: &str) -> Self {
        match id.parse::<Uuid>() {
            Ok(uuid) => GenerateTarget::Media(uuid),
            Err(_) => GenerateTarget::External(id.to_string()),
        }
    }
}

pub struct GeneratedArtifact {
    pub bytes: Bytes,
    pub format: ArtifactFormat,
    pub cached: bool,
}

#[derive(Clone)]
pub struct Orchestrator {
    media: MediaRepository,
    jobs: JobRepository,
    store: ArtifactStore,
    inference: InferenceClient,
    library: Option<LibraryClient>,
    models: ModelManager,
    cache_tx: mpsc::Sender<CacheWrite>,
    upload_dir: PathBuf,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        media: MediaRepository,
        jobs: JobRepository,
        store: ArtifactStore,
        inference: InferenceClient,
        library: Option<LibraryClient>,
        models: ModelManager,
        cache_tx: mpsc::Sender<CacheWrite>,
        upload_dir: PathBuf,
    ) -> Self {
        Self {
            media,
            jobs,
            store,
            inference,
            library,
            models,
            cache_tx,
            upload_dir,
        }
    }

    /// Persist an uploaded file, create its Media record, and enqueue
    /// processing.
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload(
        &self,
        bytes: Bytes,
        filename: &str,
        mime: &str,
    ) -> Result<(Media, Job), AppError> {
        if bytes.is_empty() {
            return Err(AppError::InvalidInput("uploaded file is empty".to_string()));
        }
        if !mime.starts_with("image/") && !mime.starts_with("video/") {
            return Err(AppError::InvalidInput(format!(
                "unsupported content type '{}'",
                mime
            )));
        }

        let kind = MediaKind::from_mime(mime);
        let stored_name = unique_upload_name(filename);
        let path = self.upload_dir.join(&stored_name);
        tokio::fs::write(&path, &bytes).await.map_err(|e| {
            AppError::Storage(format!("failed to store upload {}: {}", path.display(), e))
        })?;

        let (width, height) = match kind {
            MediaKind::Photo => match probe_dimensions(&bytes) {
                Some((w, h)) => (Some(w as i32), Some(h as i32)),
                None => (None, None),
            },
            MediaKind::Video => (None, None),
        };

        let media = self
            .media
            .create(&NewMedia {
                external_id: None,
                original_filename: filename.to_string(),
                mime_type: mime.to_string(),
                kind,
                source: MediaSource::Upload,
                file_path: Some(path.display().to_string()),
                size_bytes: bytes.len() as i64,
                captured_at: None,
                width,
                height,
            })
            .await?;

        let job = self.jobs.enqueue(media.id, DEFAULT_MAX_ATTEMPTS).await?;
        Ok((media, job))
    }

    /// Mirror an external library asset and enqueue processing. Idempotent
    /// per external id: repeating the call returns the existing media and
    /// its job.
    #[tracing::instrument(skip(self))]
    pub async fn import_external(&self, external_id: &str) -> Result<(Media, Job), AppError> {
        let library = self.library.as_ref().ok_or_else(|| {
            AppError::InvalidInput("no media library configured".to_string())
        })?;

        let info = library.info(external_id).await?;
        let media = self
            .media
            .get_or_create_external(&NewMedia {
                external_id: Some(external_id.to_string()),
                original_filename: info.filename.clone(),
                mime_type: info.mime.clone(),
                kind: MediaKind::from_mime(&info.mime),
                source: MediaSource::External,
                file_path: None,
                size_bytes: info.size_bytes.unwrap_or(0),
                captured_at: info.captured_at,
                width: info.width,
                height: info.height,
            })
            .await?;

        let job = match self.jobs.enqueue(media.id, DEFAULT_MAX_ATTEMPTS).await {
            Ok(job) => job,
            // A live or finished job already covers this media; reuse it.
            Err(AppError::AlreadyQueued { .. }) | Err(AppError::AlreadyProcessed { .. }) => self
                .jobs
                .get_by_media(media.id)
                .await?
                .ok_or_else(|| AppError::Internal("job row vanished".to_string()))?,
            Err(e) => return Err(e),
        };

        Ok((media, job))
    }

    pub async fn enqueue(&self, media_id: Uuid, max_attempts: Option<i32>) -> Result<Job, AppError> {
        self.jobs
            .enqueue(media_id, max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS))
            .await
    }

    /// Synchronous artifact generation for an actively viewing user.
    ///
    /// Cache hits stream straight from the store. On a miss the thumbnail
    /// rendition is processed with a manual-trigger model load, the caller
    /// gets the bytes immediately, and the cache write happens behind the
    /// response via the bounded side channel.
    #[tracing::instrument(skip(self))]
    pub async fn generate_on_demand(
        &self,
        target: GenerateTarget,
        kind: AssetKind,
        model_key: &str,
    ) -> Result<GeneratedArtifact, AppError> {
        let media = match &target {
            GenerateTarget::Media(id) => Some(
                self.media
                    .get(*id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("media {} not found", id)))?,
            ),
            GenerateTarget::External(external_id) => {
                self.media.get_by_external_id(external_id).await?
            }
        };

        if let Some(media) = &media {
            if let Some(artifact) = self
                .store
                .lookup(media.id, kind, Some(model_key))
                .await?
            {
                let bytes = self.store.read_bytes(&artifact).await?;
                return Ok(GeneratedArtifact {
                    bytes,
                    format: artifact.format,
                    cached: true,
                });
            }
        }

        let external_id = match &target {
            GenerateTarget::External(id) => Some(id.clone()),
            GenerateTarget::Media(_) => media.as_ref().and_then(|m| m.external_id.clone()),
        };

        let source = self.fetch_source(media.as_ref(), external_id.as_deref()).await?;

        self.models
            .ensure_loaded(model_key, LoadTrigger::Manual, None)
            .await?;

        let format = ArtifactFormat::default_for(kind);
        let bytes = match kind {
            AssetKind::Depth => self.inference.process_depth(source, Some(model_key)).await?,
            AssetKind::Splat => self.inference.process_splat(source, Some(model_key)).await?,
        };
        self.models.register_activity(LoadTrigger::Manual);

        let (width, height) = match probe_dimensions(&bytes) {
            Some((w, h)) => (Some(w as i32), Some(h as i32)),
            None => (None, None),
        };
        let base_name = media
            .as_ref()
            .map(|m| m.original_filename.clone())
            .or_else(|| external_id.clone())
            .unwrap_or_else(|| "asset".to_string());

        // The response must not wait on this; a full queue only costs a
        // regeneration later.
        let write = CacheWrite {
            media_id: media.as_ref().map(|m| m.id),
            external_id,
            base_name,
            kind,
            model_key: model_key.to_string(),
            format,
            bytes: bytes.clone(),
            width,
            height,
        };
        if let Err(e) = self.cache_tx.try_send(write) {
            tracing::warn!(error = %e, "Cache write queue full, dropping on-demand write");
        }

        Ok(GeneratedArtifact {
            bytes,
            format,
            cached: false,
        })
    }

    async fn fetch_source(
        &self,
        media: Option<&Media>,
        external_id: Option<&str>,
    ) -> Result<Bytes, AppError> {
        if let (Some(external_id), Some(library)) = (external_id, self.library.as_ref()) {
            return library.thumbnail(external_id, "jpeg", "preview").await;
        }

        let media = media.ok_or_else(|| {
            AppError::InvalidInput("no media library configured for external asset".to_string())
        })?;
        let path = media.file_path.as_deref().ok_or_else(|| {
            AppError::NotFound(format!("media {} has no local source", media.id))
        })?;
        Ok(Bytes::from(tokio::fs::read(path).await.map_err(|e| {
            AppError::Storage(format!("failed to read source file {}: {}", path, e))
        })?))
    }
}

/// Collision-proof on-disk name that still hints at the original file.
fn unique_upload_name(filename: &str) -> String {
    let path = std::path::Path::new(filename);
    let stem = path
        .file_stem()
        .map(|s| sanitize_file_stem(&s.to_string_lossy()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "upload".to_string());
    match path.extension() {
        Some(ext) => format!(
            "{}_{}.{}",
            stem,
            Uuid::new_v4(),
            sanitize_file_stem(&ext.to_string_lossy())
        ),
        None => format!("{}_{}", stem, Uuid::new_v4()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_target_parses_uuid_and_external() {
        let uuid = Uuid::new_v4();
        assert!(matches!(
            GenerateTarget::parse(&uuid.to_string()),
            GenerateTarget::Media(id) if id == uuid
        ));
        assert!(matches!(
            GenerateTarget::parse("immich-asset-42"),
            GenerateTarget::External(id) if id == "immich-asset-42"
        ));
    }

    #[test]
    fn upload_names_are_unique_but_recognizable() {
        let a = unique_upload_name("my photo.jpg");
        let b = unique_upload_name("my photo.jpg");
        assert_ne!(a, b);
        assert!(a.starts_with("my_photo_"));
        assert!(a.ends_with(".jpg"));

        let no_ext = unique_upload_name("raw");
        assert!(no_ext.starts_with("raw_"));
        assert!(!no_ext.contains('.'));
    }
}
