//! Deterministic artifact file naming.
//!
//! File name format: `{sanitized-base}_{media-id}_{model-key}_{kind}.{ext}`.
//! The same (media, kind, model, format) tuple always maps to the same name,
//! which is what makes `put` idempotent on retry.

use parallax_core::models::{ArtifactFormat, AssetKind};
use uuid::Uuid;

/// Stand-in for a missing model key in file names.
const NO_MODEL: &str = "nomodel";

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Build the artifact file name for the given identity tuple.
///
/// `base` is typically the media's original filename without extension; it is
/// sanitized here, never by callers.
pub fn artifact_file_name(
    base: &str,
    media_id: Uuid,
    model_key: Option<&str>,
    kind: AssetKind,
    format: ArtifactFormat,
) -> String {
    let model = model_key.map(sanitize_file_stem);
    format!(
        "{}_{}_{}_{}.{}",
        sanitize_file_stem(base),
        media_id,
        model.as_deref().unwrap_or(NO_MODEL),
        kind,
        format.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_allowed_chars() {
        assert_eq!(sanitize_file_stem("IMG_2024.01-a"), "IMG_2024.01-a");
    }

    #[test]
    fn sanitize_replaces_everything_else() {
        assert_eq!(sanitize_file_stem("my photo (1)"), "my_photo__1_");
        assert_eq!(sanitize_file_stem("über/café"), "_ber_caf_");
        assert_eq!(sanitize_file_stem("../etc/passwd"), ".._etc_passwd");
    }

    #[test]
    fn file_name_is_deterministic() {
        let media_id = Uuid::parse_str("6f3c8e1a-0000-0000-0000-000000000001").unwrap();
        let a = artifact_file_name(
            "sunset",
            media_id,
            Some("small"),
            AssetKind::Depth,
            ArtifactFormat::Png,
        );
        let b = artifact_file_name(
            "sunset",
            media_id,
            Some("small"),
            AssetKind::Depth,
            ArtifactFormat::Png,
        );
        assert_eq!(a, b);
        assert_eq!(
            a,
            "sunset_6f3c8e1a-0000-0000-0000-000000000001_small_depth.png"
        );
    }

    #[test]
    fn file_name_without_model_key() {
        let media_id = Uuid::nil();
        let name = artifact_file_name(
            "pic",
            media_id,
            None,
            AssetKind::Splat,
            ArtifactFormat::Ply,
        );
        assert_eq!(
            name,
            "pic_00000000-0000-0000-0000-000000000000_nomodel_splat.ply"
        );
    }

    #[test]
    fn file_name_sanitizes_model_key_too() {
        let name = artifact_file_name(
            "pic",
            Uuid::nil(),
            Some("sharp v2"),
            AssetKind::Depth,
            ArtifactFormat::Webp,
        );
        assert!(name.contains("sharp_v2"));
        assert!(name.ends_with("depth.webp"));
    }
}
