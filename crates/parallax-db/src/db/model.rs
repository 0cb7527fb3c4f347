use sqlx::{PgPool, Postgres};

use parallax_core::models::{DownloadStatus, ModelDescriptor};
use parallax_core::AppError;

const MODEL_COLUMNS: &str = r#"
    model_key,
    asset_kind,
    display_name,
    parameter_count,
    vram_mb,
    repo_id,
    download_status,
    download_progress,
    size_bytes,
    downloaded_at,
    created_at,
    updated_at
"#;

/// Persisted model catalog. Mutated only by the model manager and the
/// settings API; the download bits are reconciled against the inference
/// service at boot.
#[derive(Clone)]
pub struct ModelCatalogRepository {
    pool: PgPool,
}

impl ModelCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<ModelDescriptor>, AppError> {
        let models = sqlx::query_as::<Postgres, ModelDescriptor>(&format!(
            "SELECT {MODEL_COLUMNS} FROM models ORDER BY model_key"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(models)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, model_key: &str) -> Result<Option<ModelDescriptor>, AppError> {
        let model: Option<ModelDescriptor> = sqlx::query_as::<Postgres, ModelDescriptor>(
            &format!("SELECT {MODEL_COLUMNS} FROM models WHERE model_key = $1"),
        )
        .bind(model_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(model)
    }

    /// Set the download status; stamps `downloaded_at` when entering
    /// `downloaded` and clears progress when leaving it.
    #[tracing::instrument(skip(self))]
    pub async fn set_download_status(
        &self,
        model_key: &str,
        status: DownloadStatus,
    ) -> Result<ModelDescriptor, AppError> {
        let model: Option<ModelDescriptor> = sqlx::query_as::<Postgres, ModelDescriptor>(&format!(
            r#"
            UPDATE models
            SET download_status = $2,
                download_progress = CASE WHEN $2 = 'downloaded' THEN 100.0 ELSE 0.0 END,
                downloaded_at = CASE WHEN $2 = 'downloaded' THEN NOW() ELSE NULL END,
                updated_at = NOW()
            WHERE model_key = $1
            RETURNING {MODEL_COLUMNS}
            "#
        ))
        .bind(model_key)
        .bind(status.to_string())
        .fetch_optional(&self.pool)
        .await?;

        model.ok_or_else(|| AppError::NotFound(format!("model {} not found", model_key)))
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_download_progress(
        &self,
        model_key: &str,
        progress: f32,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE models
            SET download_progress = $2,
                updated_at = NOW()
            WHERE model_key = $1
            "#,
        )
        .bind(model_key)
        .bind(progress.clamp(0.0, 100.0))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn mark_downloaded(
        &self,
        model_key: &str,
        size_bytes: Option<i64>,
    ) -> Result<ModelDescriptor, AppError> {
        let model: Option<ModelDescriptor> = sqlx::query_as::<Postgres, ModelDescriptor>(&format!(
            r#"
            UPDATE models
            SET download_status = 'downloaded',
                download_progress = 100.0,
                size_bytes = COALESCE($2, size_bytes),
                downloaded_at = NOW(),
                updated_at = NOW()
            WHERE model_key = $1
            RETURNING {MODEL_COLUMNS}
            "#
        ))
        .bind(model_key)
        .bind(size_bytes)
        .fetch_optional(&self.pool)
        .await?;

        model.ok_or_else(|| AppError::NotFound(format!("model {} not found", model_key)))
    }
}
