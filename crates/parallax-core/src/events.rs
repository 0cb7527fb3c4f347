//! Realtime event payloads
//!
//! Typed payloads for the channels broadcast to interactive subscribers.
//! Delivery is best-effort and at-most-once per subscriber; `model:status`
//! is a snapshot-capable channel (a late subscriber can be brought up to
//! date with a synthetic event), `job:progress` is not.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{AssetKind, JobStatus};

/// Residency state reported on `model:status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ModelResidency {
    Loaded,
    Unloaded,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModelStatusEvent {
    pub status: ModelResidency,
    pub model_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DownloadProgressEvent {
    pub model_key: String,
    /// Percent, 0–100.
    pub progress: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModelErrorEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_key: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobProgressEvent {
    pub job_id: Uuid,
    pub media_id: Uuid,
    /// Human-readable processing stage, e.g. "claimed", "thumbnail", "full_resolution".
    pub stage: String,
    /// Percent, 0–100.
    pub progress: u8,
    pub status: JobStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobCompleteEvent {
    pub job_id: Uuid,
    pub media_id: Uuid,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_kind: Option<AssetKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_key: Option<String>,
    pub cached: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueueUpdateEvent {
    pub length: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<Uuid>,
    pub processing: bool,
}

/// One event on the bus; the variant selects the channel.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BusEvent {
    ModelStatus(ModelStatusEvent),
    ModelDownloadProgress(DownloadProgressEvent),
    ModelError(ModelErrorEvent),
    JobProgress(JobProgressEvent),
    JobComplete(JobCompleteEvent),
    QueueUpdate(QueueUpdateEvent),
}

impl BusEvent {
    /// Channel name as exposed to subscribers.
    pub fn channel(&self) -> &'static str {
        match self {
            BusEvent::ModelStatus(_) => "model:status",
            BusEvent::ModelDownloadProgress(_) => "model:download-progress",
            BusEvent::ModelError(_) => "model:error",
            BusEvent::JobProgress(_) => "job:progress",
            BusEvent::JobComplete(_) => "job:complete",
            BusEvent::QueueUpdate(_) => "queue:update",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_names() {
        let event = BusEvent::ModelStatus(ModelStatusEvent {
            status: ModelResidency::Loaded,
            model_key: Some("small".to_string()),
            loaded_at: None,
        });
        assert_eq!(event.channel(), "model:status");

        let event = BusEvent::ModelDownloadProgress(DownloadProgressEvent {
            model_key: "large".to_string(),
            progress: 42.0,
            bytes: None,
        });
        assert_eq!(event.channel(), "model:download-progress");

        let event = BusEvent::QueueUpdate(QueueUpdateEvent {
            length: 0,
            current: None,
            processing: false,
        });
        assert_eq!(event.channel(), "queue:update");
    }

    #[test]
    fn model_status_payload_shape() {
        let payload = serde_json::to_value(ModelStatusEvent {
            status: ModelResidency::Loaded,
            model_key: Some("small".to_string()),
            loaded_at: None,
        })
        .unwrap();
        assert_eq!(payload["status"], "loaded");
        assert_eq!(payload["model_key"], "small");
        // Absent loaded_at is omitted, not null.
        assert!(payload.get("loaded_at").is_none());
    }

    #[test]
    fn job_complete_payload_shape() {
        let payload = serde_json::to_value(JobCompleteEvent {
            job_id: Uuid::nil(),
            media_id: Uuid::nil(),
            success: true,
            artifact_kind: Some(AssetKind::Depth),
            model_key: Some("base".to_string()),
            cached: false,
        })
        .unwrap();
        assert_eq!(payload["success"], true);
        assert_eq!(payload["artifact_kind"], "depth");
        assert_eq!(payload["cached"], false);
    }
}
