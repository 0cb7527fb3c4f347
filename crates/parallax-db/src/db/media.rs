use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use parallax_core::models::{Media, NewMedia};
use parallax_core::AppError;

const MEDIA_COLUMNS: &str = r#"
    id,
    external_id,
    original_filename,
    mime_type,
    kind,
    source,
    file_path,
    size_bytes,
    captured_at,
    width,
    height,
    created_at,
    updated_at
"#;

#[derive(Clone)]
pub struct MediaRepository {
    pool: PgPool,
}

impl MediaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new media record.
    #[tracing::instrument(skip(self, new))]
    pub async fn create(&self, new: &NewMedia) -> Result<Media, AppError> {
        let media: Media = sqlx::query_as::<Postgres, Media>(&format!(
            r#"
            INSERT INTO media (
                external_id, original_filename, mime_type, kind, source,
                file_path, size_bytes, captured_at, width, height
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {MEDIA_COLUMNS}
            "#
        ))
        .bind(new.external_id.as_deref())
        .bind(&new.original_filename)
        .bind(&new.mime_type)
        .bind(new.kind.to_string())
        .bind(new.source.to_string())
        .bind(new.file_path.as_deref())
        .bind(new.size_bytes)
        .bind(new.captured_at)
        .bind(new.width)
        .bind(new.height)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            media_id = %media.id,
            kind = %media.kind,
            source = %media.source,
            "Media created"
        );

        Ok(media)
    }

    /// Insert a media record for an external asset, or return the existing
    /// row for the same external id. At most one Media per external id.
    #[tracing::instrument(skip(self, new))]
    pub async fn get_or_create_external(&self, new: &NewMedia) -> Result<Media, AppError> {
        let external_id = new.external_id.as_deref().ok_or_else(|| {
            AppError::InvalidInput("external media requires an external id".to_string())
        })?;

        // DO UPDATE on the conflict target so RETURNING yields the row in
        // both the insert and the already-exists case.
        let media: Media = sqlx::query_as::<Postgres, Media>(&format!(
            r#"
            INSERT INTO media (
                external_id, original_filename, mime_type, kind, source,
                file_path, size_bytes, captured_at, width, height
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (external_id) DO UPDATE SET updated_at = NOW()
            RETURNING {MEDIA_COLUMNS}
            "#
        ))
        .bind(external_id)
        .bind(&new.original_filename)
        .bind(&new.mime_type)
        .bind(new.kind.to_string())
        .bind(new.source.to_string())
        .bind(new.file_path.as_deref())
        .bind(new.size_bytes)
        .bind(new.captured_at)
        .bind(new.width)
        .bind(new.height)
        .fetch_one(&self.pool)
        .await?;

        Ok(media)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, media_id: Uuid) -> Result<Option<Media>, AppError> {
        let media: Option<Media> = sqlx::query_as::<Postgres, Media>(&format!(
            "SELECT {MEDIA_COLUMNS} FROM media WHERE id = $1"
        ))
        .bind(media_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(media)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_by_external_id(&self, external_id: &str) -> Result<Option<Media>, AppError> {
        let media: Option<Media> = sqlx::query_as::<Postgres, Media>(&format!(
            "SELECT {MEDIA_COLUMNS} FROM media WHERE external_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(media)
    }

    /// Backfill probed dimensions; media rows are otherwise immutable.
    #[tracing::instrument(skip(self))]
    pub async fn update_dimensions(
        &self,
        media_id: Uuid,
        width: i32,
        height: i32,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE media
            SET width = $2,
                height = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(media_id)
        .bind(width)
        .bind(height)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete a media row; jobs and artifacts cascade at the schema level.
    /// Returns whether a row was removed.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, media_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM media WHERE id = $1")
            .bind(media_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
