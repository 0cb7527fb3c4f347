use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;

use super::AssetKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    NotDownloaded,
    Downloading,
    Downloaded,
}

impl Display for DownloadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DownloadStatus::NotDownloaded => write!(f, "not_downloaded"),
            DownloadStatus::Downloading => write!(f, "downloading"),
            DownloadStatus::Downloaded => write!(f, "downloaded"),
        }
    }
}

impl FromStr for DownloadStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_downloaded" => Ok(DownloadStatus::NotDownloaded),
            "downloading" => Ok(DownloadStatus::Downloading),
            "downloaded" => Ok(DownloadStatus::Downloaded),
            _ => Err(anyhow::anyhow!("Invalid download status: {}", s)),
        }
    }
}

/// Provenance of a model load; determines the idle-unload window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoadTrigger {
    /// Loaded by the background worker; long idle window.
    Auto,
    /// Loaded for an interactive session; short idle window.
    Manual,
}

impl Display for LoadTrigger {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            LoadTrigger::Auto => write!(f, "auto"),
            LoadTrigger::Manual => write!(f, "manual"),
        }
    }
}

/// Catalog entry for an inference model.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModelDescriptor {
    pub model_key: String,
    pub kind: AssetKind,
    pub display_name: String,
    pub parameter_count: Option<i64>,
    pub vram_mb: Option<i32>,
    pub repo_id: Option<String>,
    pub download_status: DownloadStatus,
    /// Percent, 0–100.
    pub download_progress: f32,
    pub size_bytes: Option<i64>,
    pub downloaded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for ModelDescriptor {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(ModelDescriptor {
            model_key: row.get("model_key"),
            kind: row.get::<String, _>("asset_kind").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse asset kind: {}", e).into())
            })?,
            display_name: row.get("display_name"),
            parameter_count: row.get("parameter_count"),
            vram_mb: row.get("vram_mb"),
            repo_id: row.get("repo_id"),
            download_status: row
                .get::<String, _>("download_status")
                .parse()
                .map_err(|e| {
                    sqlx::Error::Decode(format!("Failed to parse download status: {}", e).into())
                })?,
            download_progress: row.get("download_progress"),
            size_bytes: row.get("size_bytes"),
            downloaded_at: row.get("downloaded_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

impl ModelDescriptor {
    /// Only models present on the inference service's disk may be loaded.
    pub fn is_loadable(&self) -> bool {
        self.download_status == DownloadStatus::Downloaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_status_roundtrip() {
        for status in [
            DownloadStatus::NotDownloaded,
            DownloadStatus::Downloading,
            DownloadStatus::Downloaded,
        ] {
            assert_eq!(
                status.to_string().parse::<DownloadStatus>().unwrap(),
                status
            );
        }
        assert!("partial".parse::<DownloadStatus>().is_err());
    }

    #[test]
    fn load_trigger_display() {
        assert_eq!(LoadTrigger::Auto.to_string(), "auto");
        assert_eq!(LoadTrigger::Manual.to_string(), "manual");
    }

    #[test]
    fn loadable_requires_downloaded() {
        let mut descriptor = ModelDescriptor {
            model_key: "small".to_string(),
            kind: AssetKind::Depth,
            display_name: "Small".to_string(),
            parameter_count: Some(25_000_000),
            vram_mb: Some(2048),
            repo_id: None,
            download_status: DownloadStatus::NotDownloaded,
            download_progress: 0.0,
            size_bytes: None,
            downloaded_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(!descriptor.is_loadable());
        descriptor.download_status = DownloadStatus::Downloading;
        assert!(!descriptor.is_loadable());
        descriptor.download_status = DownloadStatus::Downloaded;
        assert!(descriptor.is_loadable());
    }
}
