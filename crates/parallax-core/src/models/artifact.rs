use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Kind of 3D-view artifact a model produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Depth,
    Splat,
}

impl Display for AssetKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AssetKind::Depth => write!(f, "depth"),
            AssetKind::Splat => write!(f, "splat"),
        }
    }
}

impl FromStr for AssetKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "depth" => Ok(AssetKind::Depth),
            "splat" => Ok(AssetKind::Splat),
            _ => Err(anyhow::anyhow!("Invalid asset kind: {}", s)),
        }
    }
}

/// On-disk artifact encoding. Extension and content type derive from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    Png,
    Jpg,
    Webp,
    Ply,
    Splat,
    Ksplat,
}

impl Display for ArtifactFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for ArtifactFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "png" => Ok(ArtifactFormat::Png),
            "jpg" | "jpeg" => Ok(ArtifactFormat::Jpg),
            "webp" => Ok(ArtifactFormat::Webp),
            "ply" => Ok(ArtifactFormat::Ply),
            "splat" => Ok(ArtifactFormat::Splat),
            "ksplat" => Ok(ArtifactFormat::Ksplat),
            _ => Err(anyhow::anyhow!("Invalid artifact format: {}", s)),
        }
    }
}

impl ArtifactFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Png => "png",
            ArtifactFormat::Jpg => "jpg",
            ArtifactFormat::Webp => "webp",
            ArtifactFormat::Ply => "ply",
            ArtifactFormat::Splat => "splat",
            ArtifactFormat::Ksplat => "ksplat",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactFormat::Png => "image/png",
            ArtifactFormat::Jpg => "image/jpeg",
            ArtifactFormat::Webp => "image/webp",
            ArtifactFormat::Ply | ArtifactFormat::Splat | ArtifactFormat::Ksplat => {
                "application/octet-stream"
            }
        }
    }

    /// What the inference service emits for each asset kind.
    pub fn default_for(kind: AssetKind) -> Self {
        match kind {
            AssetKind::Depth => ArtifactFormat::Png,
            AssetKind::Splat => ArtifactFormat::Ply,
        }
    }
}

/// Source-resolution label recorded in artifact metadata. Variant is
/// descriptive metadata, not part of the artifact's unique key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VariantLabel {
    Thumbnail,
    FullResolution,
}

impl Display for VariantLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            VariantLabel::Thumbnail => write!(f, "thumbnail"),
            VariantLabel::FullResolution => write!(f, "full_resolution"),
        }
    }
}

/// A generated derivative of a Media. Unique per
/// (media_id, kind, model_key, format), with NULL model_key comparing equal.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Artifact {
    pub id: Uuid,
    pub media_id: Uuid,
    pub kind: AssetKind,
    pub model_key: Option<String>,
    pub format: ArtifactFormat,
    pub file_path: String,
    pub size_bytes: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub metadata: JsonValue,
    pub generated_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for Artifact {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Artifact {
            id: row.get("id"),
            media_id: row.get("media_id"),
            kind: row.get::<String, _>("asset_kind").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse asset kind: {}", e).into())
            })?,
            model_key: row.get("model_key"),
            format: row.get::<String, _>("format").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse artifact format: {}", e).into())
            })?,
            file_path: row.get("file_path"),
            size_bytes: row.get("size_bytes"),
            width: row.get("width"),
            height: row.get("height"),
            metadata: row.get("metadata"),
            generated_at: row.get("generated_at"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_kind_roundtrip() {
        assert_eq!("depth".parse::<AssetKind>().unwrap(), AssetKind::Depth);
        assert_eq!("splat".parse::<AssetKind>().unwrap(), AssetKind::Splat);
        assert!("mesh".parse::<AssetKind>().is_err());
        assert_eq!(AssetKind::Depth.to_string(), "depth");
    }

    #[test]
    fn format_extensions() {
        assert_eq!(ArtifactFormat::Png.extension(), "png");
        assert_eq!(ArtifactFormat::Jpg.extension(), "jpg");
        assert_eq!(ArtifactFormat::Webp.extension(), "webp");
        assert_eq!(ArtifactFormat::Ply.extension(), "ply");
        assert_eq!(ArtifactFormat::Splat.extension(), "splat");
        assert_eq!(ArtifactFormat::Ksplat.extension(), "ksplat");
    }

    #[test]
    fn format_parse_accepts_jpeg_alias() {
        assert_eq!("jpeg".parse::<ArtifactFormat>().unwrap(), ArtifactFormat::Jpg);
        assert!("gif".parse::<ArtifactFormat>().is_err());
    }

    #[test]
    fn format_content_types() {
        assert_eq!(ArtifactFormat::Png.content_type(), "image/png");
        assert_eq!(
            ArtifactFormat::Ply.content_type(),
            "application/octet-stream"
        );
    }

    #[test]
    fn default_format_per_kind() {
        assert_eq!(
            ArtifactFormat::default_for(AssetKind::Depth),
            ArtifactFormat::Png
        );
        assert_eq!(
            ArtifactFormat::default_for(AssetKind::Splat),
            ArtifactFormat::Ply
        );
    }

    #[test]
    fn variant_labels() {
        assert_eq!(VariantLabel::Thumbnail.to_string(), "thumbnail");
        assert_eq!(VariantLabel::FullResolution.to_string(), "full_resolution");
    }
}
