use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use parallax_core::models::{Artifact, ArtifactFormat, AssetKind};
use parallax_core::AppError;

const ARTIFACT_COLUMNS: &str = r#"
    id,
    media_id,
    asset_kind,
    model_key,
    format,
    file_path,
    size_bytes,
    width,
    height,
    metadata,
    generated_at
"#;

/// Row-level half of the artifact store. File handling lives in
/// [`crate::ArtifactStore`]; nothing else writes this table.
#[derive(Clone)]
pub struct ArtifactRepository {
    pool: PgPool,
}

/// Insert/replace payload for the unique (media, kind, model, format) tuple.
#[derive(Debug, Clone)]
pub struct UpsertArtifact {
    pub media_id: Uuid,
    pub kind: AssetKind,
    pub model_key: Option<String>,
    pub format: ArtifactFormat,
    pub file_path: String,
    pub size_bytes: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub metadata: JsonValue,
}

impl ArtifactRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert by the unique tuple; the artifacts table declares the
    /// constraint NULLS NOT DISTINCT so a NULL model key compares equal.
    /// Last writer wins on body and metadata; `generated_at` always advances.
    #[tracing::instrument(skip(self, upsert), fields(media_id = %upsert.media_id, kind = %upsert.kind))]
    pub async fn upsert(&self, upsert: &UpsertArtifact) -> Result<Artifact, AppError> {
        let artifact: Artifact = sqlx::query_as::<Postgres, Artifact>(&format!(
            r#"
            INSERT INTO artifacts (
                media_id, asset_kind, model_key, format, file_path,
                size_bytes, width, height, metadata, generated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            ON CONFLICT (media_id, asset_kind, model_key, format)
            DO UPDATE SET
                file_path = EXCLUDED.file_path,
                size_bytes = EXCLUDED.size_bytes,
                width = EXCLUDED.width,
                height = EXCLUDED.height,
                metadata = EXCLUDED.metadata,
                generated_at = NOW()
            RETURNING {ARTIFACT_COLUMNS}
            "#
        ))
        .bind(upsert.media_id)
        .bind(upsert.kind.to_string())
        .bind(upsert.model_key.as_deref())
        .bind(upsert.format.to_string())
        .bind(&upsert.file_path)
        .bind(upsert.size_bytes)
        .bind(upsert.width)
        .bind(upsert.height)
        .bind(&upsert.metadata)
        .fetch_one(&self.pool)
        .await?;

        Ok(artifact)
    }

    /// Newest artifact for (media, kind, model) across formats.
    #[tracing::instrument(skip(self))]
    pub async fn find(
        &self,
        media_id: Uuid,
        kind: AssetKind,
        model_key: Option<&str>,
    ) -> Result<Option<Artifact>, AppError> {
        let artifact: Option<Artifact> = sqlx::query_as::<Postgres, Artifact>(&format!(
            r#"
            SELECT {ARTIFACT_COLUMNS} FROM artifacts
            WHERE media_id = $1
                AND asset_kind = $2
                AND model_key IS NOT DISTINCT FROM $3
            ORDER BY generated_at DESC
            LIMIT 1
            "#
        ))
        .bind(media_id)
        .bind(kind.to_string())
        .bind(model_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(artifact)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, artifact_id: Uuid) -> Result<Option<Artifact>, AppError> {
        let artifact: Option<Artifact> = sqlx::query_as::<Postgres, Artifact>(&format!(
            "SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE id = $1"
        ))
        .bind(artifact_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(artifact)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_by_media(&self, media_id: Uuid) -> Result<Vec<Artifact>, AppError> {
        let artifacts = sqlx::query_as::<Postgres, Artifact>(&format!(
            r#"
            SELECT {ARTIFACT_COLUMNS} FROM artifacts
            WHERE media_id = $1
            ORDER BY generated_at DESC
            "#
        ))
        .bind(media_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(artifacts)
    }

    /// Delete a row and return it so the caller can unlink the file.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, artifact_id: Uuid) -> Result<Option<Artifact>, AppError> {
        let artifact: Option<Artifact> = sqlx::query_as::<Postgres, Artifact>(&format!(
            "DELETE FROM artifacts WHERE id = $1 RETURNING {ARTIFACT_COLUMNS}"
        ))
        .bind(artifact_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(artifact)
    }
}
