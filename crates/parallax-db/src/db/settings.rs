use sqlx::{PgPool, Postgres};

use parallax_core::models::{UpdateSettings, UserSettings, DEFAULT_MODEL_KEY};
use parallax_core::AppError;

const SETTINGS_COLUMNS: &str = r#"
    id,
    user_id,
    default_model,
    auto_generate_on_view,
    updated_at
"#;

/// Global preferences; one row with a NULL user id.
#[derive(Clone)]
pub struct SettingsRepository {
    pool: PgPool,
}

impl SettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self) -> Result<Option<UserSettings>, AppError> {
        let settings: Option<UserSettings> = sqlx::query_as::<Postgres, UserSettings>(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM user_settings WHERE user_id IS NULL"
        ))
        .fetch_optional(&self.pool)
        .await?;

        Ok(settings)
    }

    /// The configured default model, falling back to the static default when
    /// no settings row exists yet.
    #[tracing::instrument(skip(self))]
    pub async fn default_model(&self) -> Result<String, AppError> {
        Ok(self
            .get()
            .await?
            .map(|s| s.default_model)
            .unwrap_or_else(|| DEFAULT_MODEL_KEY.to_string()))
    }

    /// Apply a partial update, creating the singleton row on first use.
    /// The user_settings unique index is declared NULLS NOT DISTINCT so the
    /// global row conflicts with itself.
    #[tracing::instrument(skip(self, update))]
    pub async fn update(&self, update: &UpdateSettings) -> Result<UserSettings, AppError> {
        let settings: UserSettings = sqlx::query_as::<Postgres, UserSettings>(&format!(
            r#"
            INSERT INTO user_settings (user_id, default_model, auto_generate_on_view)
            VALUES (NULL, COALESCE($1, $3), COALESCE($2, FALSE))
            ON CONFLICT (user_id)
            DO UPDATE SET
                default_model = COALESCE($1, user_settings.default_model),
                auto_generate_on_view = COALESCE($2, user_settings.auto_generate_on_view),
                updated_at = NOW()
            RETURNING {SETTINGS_COLUMNS}
            "#
        ))
        .bind(update.default_model.as_deref())
        .bind(update.auto_generate_on_view)
        .bind(DEFAULT_MODEL_KEY)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            default_model = %settings.default_model,
            auto_generate_on_view = settings.auto_generate_on_view,
            "Settings updated"
        );

        Ok(settings)
    }
}
