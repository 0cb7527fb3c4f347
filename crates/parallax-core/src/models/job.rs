use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use super::MediaKind;

/// Priority base for photos; encoded range [1, 100].
const PHOTO_PRIORITY_BASE: i64 = 1;
/// Priority base for videos; encoded range [101, 200].
const VIDEO_PRIORITY_BASE: i64 = 101;
/// Size bucket divisor: one bucket per percent of 100 MiB, capped at 99.
const SIZE_BUCKET_BYTES: i64 = 100 * 1024 * 1024;

/// Encode the claim priority for a media item. Lower claims earlier.
///
/// Photos always order before videos; within a kind, smaller files first.
/// The queue itself only relies on these two properties, not on the exact
/// integers.
pub fn compute_priority(kind: MediaKind, size_bytes: i64) -> i32 {
    let bucket = (size_bytes.max(0) * 100 / SIZE_BUCKET_BYTES).min(99);
    let base = match kind {
        MediaKind::Photo => PHOTO_PRIORITY_BASE,
        MediaKind::Video => VIDEO_PRIORITY_BASE,
    };
    (base + bucket) as i32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Reserved; no code path currently produces it.
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

impl JobStatus {
    /// Completed, failed and cancelled jobs stay put until revived or retried.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// A job in one of these states blocks a fresh enqueue for its media.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            JobStatus::Pending | JobStatus::Queued | JobStatus::Processing
        )
    }

    /// Cancellation is only reachable from pending/queued; a processing job
    /// cannot be interrupted mid-inference.
    pub fn can_cancel(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Queued)
    }

    /// Enqueue revives failed and cancelled jobs in place.
    pub fn can_revive(&self) -> bool {
        matches!(self, JobStatus::Failed | JobStatus::Cancelled)
    }
}

/// A queued request to produce artifacts for one media item.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Job {
    pub id: Uuid,
    pub media_id: Uuid,
    pub status: JobStatus,
    pub priority: i32,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_error: Option<String>,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub processing_duration_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for Job {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Job {
            id: row.get("id"),
            media_id: row.get("media_id"),
            status: row.get::<String, _>("status").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse job status: {}", e).into())
            })?,
            priority: row.get("priority"),
            attempts: row.get("attempts"),
            max_attempts: row.get("max_attempts"),
            last_error: row.get("last_error"),
            queued_at: row.get("queued_at"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
            processing_duration_ms: row.get("processing_duration_ms"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

impl Job {
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

/// Outcome of `mark_failed`: whether the job went back into the queue.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct RetryDecision {
    pub retry: bool,
    pub attempts: i32,
    pub max_attempts: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JobStats {
    pub total: i64,
    pub pending: i64,
    pub queued: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub cancelled: i64,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct JobListQuery {
    pub status: Option<JobStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: i64 = 1024 * 1024;

    #[test]
    fn priority_photos_before_videos() {
        // 50 MB photo still orders before a 1 MB video.
        let big_photo = compute_priority(MediaKind::Photo, 50 * MIB);
        let small_video = compute_priority(MediaKind::Video, MIB);
        assert!(big_photo < small_video);
    }

    #[test]
    fn priority_smaller_files_first_within_kind() {
        let a = compute_priority(MediaKind::Photo, 2 * MIB);
        let b = compute_priority(MediaKind::Photo, 50 * MIB);
        assert!(a < b);
    }

    #[test]
    fn priority_encoding_ranges() {
        assert_eq!(compute_priority(MediaKind::Photo, 0), 1);
        assert_eq!(compute_priority(MediaKind::Photo, 2 * MIB), 3);
        assert_eq!(compute_priority(MediaKind::Photo, 50 * MIB), 51);
        // Cap: a 10 GB photo never crosses into the video range.
        assert_eq!(compute_priority(MediaKind::Photo, 10 * 1024 * MIB), 100);
        assert_eq!(compute_priority(MediaKind::Video, MIB), 102);
        assert_eq!(compute_priority(MediaKind::Video, 10 * 1024 * MIB), 200);
    }

    #[test]
    fn priority_negative_size_clamped() {
        assert_eq!(compute_priority(MediaKind::Photo, -1), 1);
    }

    #[test]
    fn job_status_display_and_parse() {
        for status in [
            JobStatus::Pending,
            JobStatus::Queued,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            assert_eq!(status.to_string().parse::<JobStatus>().unwrap(), status);
        }
        assert!("running".parse::<JobStatus>().is_err());
    }

    #[test]
    fn job_status_classification() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());

        assert!(JobStatus::Queued.is_active());
        assert!(JobStatus::Processing.is_active());
        assert!(JobStatus::Pending.is_active());
        assert!(!JobStatus::Failed.is_active());

        assert!(JobStatus::Queued.can_cancel());
        assert!(JobStatus::Pending.can_cancel());
        assert!(!JobStatus::Processing.can_cancel());

        assert!(JobStatus::Failed.can_revive());
        assert!(JobStatus::Cancelled.can_revive());
        assert!(!JobStatus::Completed.can_revive());
    }

    #[test]
    fn job_can_retry_under_cap() {
        let mut job = Job {
            id: Uuid::new_v4(),
            media_id: Uuid::new_v4(),
            status: JobStatus::Processing,
            priority: 3,
            attempts: 2,
            max_attempts: 3,
            last_error: None,
            queued_at: Utc::now(),
            started_at: Some(Utc::now()),
            completed_at: None,
            processing_duration_ms: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(job.can_retry());
        job.attempts = 3;
        assert!(!job.can_retry());
    }
}
