use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Media kind enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaKind::Photo => write!(f, "photo"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

impl FromStr for MediaKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "photo" => Ok(MediaKind::Photo),
            "video" => Ok(MediaKind::Video),
            _ => Err(anyhow::anyhow!("Invalid media kind: {}", s)),
        }
    }
}

impl MediaKind {
    /// Derive the kind from a MIME type. Anything that is not `video/*`
    /// is treated as a photo; unknown types fail at upload validation instead.
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("video/") {
            MediaKind::Video
        } else {
            MediaKind::Photo
        }
    }
}

/// Where the media originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaSource {
    /// Uploaded directly through the REST facade; bytes live under UPLOAD_DIR.
    Upload,
    /// Mirrored from the external media library; bytes fetched on demand.
    External,
}

impl Display for MediaSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaSource::Upload => write!(f, "upload"),
            MediaSource::External => write!(f, "external"),
        }
    }
}

impl FromStr for MediaSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(MediaSource::Upload),
            "external" => Ok(MediaSource::External),
            _ => Err(anyhow::anyhow!("Invalid media source: {}", s)),
        }
    }
}

/// An imported or externally referenced photo/video.
///
/// At most one Media exists per external id; media without an external id
/// are identified by internal id alone. Deleting a Media cascades to its
/// jobs and artifacts.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Media {
    pub id: Uuid,
    pub external_id: Option<String>,
    pub original_filename: String,
    pub mime_type: String,
    pub kind: MediaKind,
    pub source: MediaSource,
    /// Path under UPLOAD_DIR for uploaded media; None for external references.
    pub file_path: Option<String>,
    pub size_bytes: i64,
    pub captured_at: Option<DateTime<Utc>>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for Media {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Media {
            id: row.get("id"),
            external_id: row.get("external_id"),
            original_filename: row.get("original_filename"),
            mime_type: row.get("mime_type"),
            kind: row.get::<String, _>("kind").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse media kind: {}", e).into())
            })?,
            source: row.get::<String, _>("source").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse media source: {}", e).into())
            })?,
            file_path: row.get("file_path"),
            size_bytes: row.get("size_bytes"),
            captured_at: row.get("captured_at"),
            width: row.get("width"),
            height: row.get("height"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

impl Media {
    pub fn is_external(&self) -> bool {
        self.source == MediaSource::External
    }
}

/// Insert payload for a new media record.
#[derive(Debug, Clone)]
pub struct NewMedia {
    pub external_id: Option<String>,
    pub original_filename: String,
    pub mime_type: String,
    pub kind: MediaKind,
    pub source: MediaSource,
    pub file_path: Option<String>,
    pub size_bytes: i64,
    pub captured_at: Option<DateTime<Utc>>,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

impl NewMedia {
    /// Minimal stub for an external asset seen only through the on-demand
    /// path, before any library metadata has been fetched.
    pub fn external_stub(external_id: &str) -> Self {
        Self {
            external_id: Some(external_id.to_string()),
            original_filename: external_id.to_string(),
            mime_type: "image/jpeg".to_string(),
            kind: MediaKind::Photo,
            source: MediaSource::External,
            file_path: None,
            size_bytes: 0,
            captured_at: None,
            width: None,
            height: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_kind_display_and_parse() {
        assert_eq!(MediaKind::Photo.to_string(), "photo");
        assert_eq!(MediaKind::Video.to_string(), "video");
        assert_eq!("photo".parse::<MediaKind>().unwrap(), MediaKind::Photo);
        assert_eq!("video".parse::<MediaKind>().unwrap(), MediaKind::Video);
        assert!("audio".parse::<MediaKind>().is_err());
    }

    #[test]
    fn media_kind_from_mime() {
        assert_eq!(MediaKind::from_mime("image/jpeg"), MediaKind::Photo);
        assert_eq!(MediaKind::from_mime("image/png"), MediaKind::Photo);
        assert_eq!(MediaKind::from_mime("video/mp4"), MediaKind::Video);
    }

    #[test]
    fn media_source_parse() {
        assert_eq!("upload".parse::<MediaSource>().unwrap(), MediaSource::Upload);
        assert_eq!(
            "external".parse::<MediaSource>().unwrap(),
            MediaSource::External
        );
        assert!("ftp".parse::<MediaSource>().is_err());
    }

    #[test]
    fn external_stub_has_external_source() {
        let stub = NewMedia::external_stub("abc-123");
        assert_eq!(stub.external_id.as_deref(), Some("abc-123"));
        assert_eq!(stub.source, MediaSource::External);
        assert_eq!(stub.kind, MediaKind::Photo);
        assert_eq!(stub.size_bytes, 0);
    }
}
