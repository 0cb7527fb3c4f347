//! Artifact store: the single authority on whether an artifact exists.
//!
//! A row is only as good as its file. `lookup` verifies the file is still on
//! disk and drops the row when it is not, so out-of-band deletions simply
//! cause regeneration instead of serving dangling paths.

use bytes::Bytes;
use serde_json::Value as JsonValue;
use std::path::Path;
use uuid::Uuid;

use parallax_core::models::{Artifact, ArtifactFormat, AssetKind};
use parallax_core::AppError;
use parallax_storage::{artifact_file_name, ArtifactRoot};

use crate::db::{ArtifactRepository, UpsertArtifact};

#[derive(Clone)]
pub struct ArtifactStore {
    repository: ArtifactRepository,
    root: ArtifactRoot,
}

/// Write request for [`ArtifactStore::put`].
#[derive(Debug, Clone)]
pub struct PutArtifact {
    pub media_id: Uuid,
    /// File stem for the artifact name, typically the media's original
    /// filename without extension. Sanitized by the storage layer.
    pub base_name: String,
    pub kind: AssetKind,
    pub model_key: Option<String>,
    pub format: ArtifactFormat,
    pub bytes: Bytes,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub metadata: JsonValue,
}

impl ArtifactStore {
    pub fn new(repository: ArtifactRepository, root: ArtifactRoot) -> Self {
        Self { repository, root }
    }

    /// Find the artifact for (media, kind, model), verifying its file.
    /// A row whose file is gone is deleted and reported as absent.
    #[tracing::instrument(skip(self))]
    pub async fn lookup(
        &self,
        media_id: Uuid,
        kind: AssetKind,
        model_key: Option<&str>,
    ) -> Result<Option<Artifact>, AppError> {
        let Some(artifact) = self.repository.find(media_id, kind, model_key).await? else {
            return Ok(None);
        };

        if self.root.exists(Path::new(&artifact.file_path)).await {
            return Ok(Some(artifact));
        }

        tracing::warn!(
            artifact_id = %artifact.id,
            file_path = %artifact.file_path,
            "Artifact file missing on disk, dropping stale row"
        );
        self.repository.delete(artifact.id).await?;
        Ok(None)
    }

    /// Read an artifact's bytes from disk.
    pub async fn read_bytes(&self, artifact: &Artifact) -> Result<Bytes, AppError> {
        Ok(self.root.read(Path::new(&artifact.file_path)).await?)
    }

    /// Write bytes to the deterministic artifact path and upsert the row.
    /// Idempotent: repeating the call with identical input converges on the
    /// same file and row.
    #[tracing::instrument(skip(self, put), fields(media_id = %put.media_id, kind = %put.kind, size = put.bytes.len()))]
    pub async fn put(&self, put: PutArtifact) -> Result<Artifact, AppError> {
        let file_name = artifact_file_name(
            &put.base_name,
            put.media_id,
            put.model_key.as_deref(),
            put.kind,
            put.format,
        );
        let path = self.root.write_atomic(&file_name, &put.bytes).await?;

        let artifact = self
            .repository
            .upsert(&UpsertArtifact {
                media_id: put.media_id,
                kind: put.kind,
                model_key: put.model_key,
                format: put.format,
                file_path: path.display().to_string(),
                size_bytes: put.bytes.len() as i64,
                width: put.width,
                height: put.height,
                metadata: put.metadata,
            })
            .await?;

        tracing::info!(
            artifact_id = %artifact.id,
            file_path = %artifact.file_path,
            "Artifact stored"
        );

        Ok(artifact)
    }

    /// Remove the row, then try to unlink the file. Unlink failures are
    /// logged and swallowed; the row is the source of truth.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, artifact_id: Uuid) -> Result<Artifact, AppError> {
        let artifact = self
            .repository
            .delete(artifact_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("artifact {} not found", artifact_id)))?;

        if let Err(e) = self.root.remove(Path::new(&artifact.file_path)).await {
            tracing::warn!(
                artifact_id = %artifact_id,
                file_path = %artifact.file_path,
                error = %e,
                "Failed to unlink artifact file"
            );
        }

        Ok(artifact)
    }

    pub async fn get(&self, artifact_id: Uuid) -> Result<Option<Artifact>, AppError> {
        self.repository.get(artifact_id).await
    }

    pub async fn list_by_media(&self, media_id: Uuid) -> Result<Vec<Artifact>, AppError> {
        self.repository.list_by_media(media_id).await
    }
}
