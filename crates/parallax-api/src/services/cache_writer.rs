//! Fire-and-forget artifact cache writes.
//!
//! The on-demand path answers the caller first and hands the generated bytes
//! to this bounded side channel. The writer task creates a stub Media for
//! external assets seen for the first time and upserts the artifact.
//! Failures (and a full queue) are logged and never reach the request path;
//! a dropped write just costs one extra inference on a later request.

use bytes::Bytes;
use serde_json::json;
use tokio::sync::mpsc;
use uuid::Uuid;

use parallax_core::models::{ArtifactFormat, AssetKind, NewMedia};
use parallax_db::{ArtifactStore, MediaRepository, PutArtifact};
use parallax_storage::sanitize_file_stem;

#[derive(Debug, Clone)]
pub struct CacheWrite {
    /// Known media row, when the request resolved one.
    pub media_id: Option<Uuid>,
    /// External id, for stub creation when no row exists yet.
    pub external_id: Option<String>,
    pub base_name: String,
    pub kind: AssetKind,
    pub model_key: String,
    pub format: ArtifactFormat,
    pub bytes: Bytes,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

/// Spawn the writer task and return its bounded sender.
pub fn spawn_cache_writer(
    media: MediaRepository,
    store: ArtifactStore,
    capacity: usize,
) -> mpsc::Sender<CacheWrite> {
    let (tx, mut rx) = mpsc::channel::<CacheWrite>(capacity.max(1));

    tokio::spawn(async move {
        while let Some(write) = rx.recv().await {
            if let Err(e) = persist(&media, &store, &write).await {
                tracing::warn!(
                    media_id = ?write.media_id,
                    external_id = ?write.external_id,
                    error = %e,
                    "On-demand cache write failed"
                );
            }
        }
        tracing::debug!("Cache writer channel closed");
    });

    tx
}

async fn persist(
    media: &MediaRepository,
    store: &ArtifactStore,
    write: &CacheWrite,
) -> Result<(), parallax_core::AppError> {
    let media_id = match write.media_id {
        Some(id) => id,
        None => {
            let external_id = write.external_id.as_deref().ok_or_else(|| {
                parallax_core::AppError::Internal(
                    "cache write without media or external id".to_string(),
                )
            })?;
            media
                .get_or_create_external(&NewMedia::external_stub(external_id))
                .await?
                .id
        }
    };

    store
        .put(PutArtifact {
            media_id,
            base_name: sanitize_file_stem(&write.base_name),
            kind: write.kind,
            model_key: Some(write.model_key.clone()),
            format: write.format,
            bytes: write.bytes.clone(),
            width: write.width,
            height: write.height,
            metadata: json!({
                "variant": "thumbnail",
                "source": "on_demand",
            }),
        })
        .await?;

    tracing::debug!(media_id = %media_id, "On-demand artifact cached");
    Ok(())
}
