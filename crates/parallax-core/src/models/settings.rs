use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Per-user preferences; a single global row (NULL user id) in practice.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct UserSettings {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub default_model: String,
    pub auto_generate_on_view: bool,
    pub updated_at: DateTime<Utc>,
}

/// Partial update; unset fields keep their current value.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateSettings {
    pub default_model: Option<String>,
    pub auto_generate_on_view: Option<bool>,
}

/// Fallback model when no settings row exists yet.
pub const DEFAULT_MODEL_KEY: &str = "base";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_settings_defaults_to_no_changes() {
        let update = UpdateSettings::default();
        assert!(update.default_model.is_none());
        assert!(update.auto_generate_on_view.is_none());
    }
}
