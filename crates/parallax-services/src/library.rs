//! External media-library adapter.
//!
//! Thin client over the photo server's HTTP API: asset metadata, thumbnail
//! and original bytes, and timeline browsing. The timeline bucket endpoint
//! may answer with a columnar object of parallel arrays; the transpose to
//! row records happens here and nowhere else.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use parallax_core::models::MediaKind;
use parallax_core::AppError;

/// Deadline for metadata endpoints.
const METADATA_TIMEOUT: Duration = Duration::from_secs(30);
/// Deadline for binary downloads (thumbnail/original).
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);
const ERROR_BODY_LIMIT: usize = 512;

/// Metadata for one library asset.
#[derive(Debug, Clone)]
pub struct LibraryAssetInfo {
    pub mime: String,
    pub filename: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub captured_at: Option<DateTime<Utc>>,
    pub size_bytes: Option<i64>,
}

/// One row of a timeline bucket listing.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryAsset {
    pub id: String,
    pub kind: MediaKind,
    pub original_file_name: String,
    pub captured_at: Option<DateTime<Utc>>,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineBucket {
    #[serde(rename = "timeBucket")]
    pub bucket: String,
    pub count: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExif {
    exif_image_width: Option<i32>,
    exif_image_height: Option<i32>,
    file_size_in_byte: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAsset {
    id: String,
    #[serde(rename = "type")]
    asset_type: Option<String>,
    original_file_name: Option<String>,
    original_mime_type: Option<String>,
    file_created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    exif_info: Option<RawExif>,
}

impl RawAsset {
    fn kind(&self) -> MediaKind {
        match self.asset_type.as_deref() {
            Some("VIDEO") | Some("video") => MediaKind::Video,
            _ => MediaKind::Photo,
        }
    }
}

/// Columnar bucket shape: parallel arrays indexed by asset position.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ColumnarBucket {
    id: Vec<String>,
    #[serde(default)]
    is_image: Option<Vec<bool>>,
    #[serde(default)]
    original_file_name: Option<Vec<String>>,
    #[serde(default)]
    file_created_at: Option<Vec<Option<DateTime<Utc>>>>,
    #[serde(default)]
    width: Option<Vec<Option<i32>>>,
    #[serde(default)]
    height: Option<Vec<Option<i32>>>,
}

/// The bucket endpoint answers either rows or columns depending on server
/// version; both funnel through [`transpose_bucket`].
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BucketResponse {
    Rows(Vec<RawAsset>),
    Columnar(ColumnarBucket),
}

fn transpose_bucket(response: BucketResponse) -> Vec<LibraryAsset> {
    match response {
        BucketResponse::Rows(rows) => rows
            .into_iter()
            .map(|raw| {
                let kind = raw.kind();
                let (width, height) = raw
                    .exif_info
                    .as_ref()
                    .map(|e| (e.exif_image_width, e.exif_image_height))
                    .unwrap_or((None, None));
                LibraryAsset {
                    original_file_name: raw.original_file_name.unwrap_or_else(|| raw.id.clone()),
                    captured_at: raw.file_created_at,
                    id: raw.id,
                    kind,
                    width,
                    height,
                }
            })
            .collect(),
        BucketResponse::Columnar(columns) => {
            let column =
                |values: &Option<Vec<Option<i32>>>, i: usize| values.as_ref().and_then(|v| v.get(i).copied().flatten());
            (0..columns.id.len())
                .map(|i| LibraryAsset {
                    id: columns.id[i].clone(),
                    kind: match columns.is_image.as_ref().and_then(|v| v.get(i)) {
                        Some(false) => MediaKind::Video,
                        _ => MediaKind::Photo,
                    },
                    original_file_name: columns
                        .original_file_name
                        .as_ref()
                        .and_then(|v| v.get(i).cloned())
                        .unwrap_or_else(|| columns.id[i].clone()),
                    captured_at: columns
                        .file_created_at
                        .as_ref()
                        .and_then(|v| v.get(i).copied().flatten()),
                    width: column(&columns.width, i),
                    height: column(&columns.height, i),
                })
                .collect()
        }
    }
}

#[derive(Clone, Debug)]
pub struct LibraryClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl LibraryClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .timeout(METADATA_TIMEOUT)
    }

    fn map_send_error(operation: &str, err: reqwest::Error) -> AppError {
        if err.is_timeout() {
            AppError::Timeout {
                operation: operation.to_string(),
            }
        } else {
            AppError::Unreachable {
                service: "library".to_string(),
                message: err.to_string(),
            }
        }
    }

    /// 401 means bad credentials, 404 an unknown asset; everything else
    /// non-2xx surfaces as Remote.
    async fn check_status(
        operation: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, AppError> {
        let status = response.status().as_u16();
        match status {
            200..=299 => Ok(response),
            401 => Err(AppError::Unauthorized(
                "library rejected the configured API key".to_string(),
            )),
            404 => Err(AppError::NotFound(format!(
                "library asset not found ({})",
                operation
            ))),
            _ => {
                let mut body = response.text().await.unwrap_or_default();
                body.truncate(ERROR_BODY_LIMIT);
                Err(AppError::Remote {
                    status,
                    message: body,
                })
            }
        }
    }

    /// Reachability + credential check.
    #[tracing::instrument(skip(self))]
    pub async fn test(&self) -> Result<(), AppError> {
        let response = self
            .get("/ping")
            .send()
            .await
            .map_err(|e| Self::map_send_error("ping", e))?;
        Self::check_status("ping", response).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn version(&self) -> Result<String, AppError> {
        let response = self
            .get("/version")
            .send()
            .await
            .map_err(|e| Self::map_send_error("version", e))?;
        let response = Self::check_status("version", response).await?;
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Self::map_send_error("version", e))?;

        match (&value["major"], &value["minor"], &value["patch"]) {
            (
                serde_json::Value::Number(major),
                serde_json::Value::Number(minor),
                serde_json::Value::Number(patch),
            ) => Ok(format!("{}.{}.{}", major, minor, patch)),
            _ => Ok(value
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string())),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn info(&self, external_id: &str) -> Result<LibraryAssetInfo, AppError> {
        let response = self
            .get(&format!("/assets/{}", external_id))
            .send()
            .await
            .map_err(|e| Self::map_send_error("info", e))?;
        let response = Self::check_status("info", response).await?;
        let raw: RawAsset = response
            .json()
            .await
            .map_err(|e| Self::map_send_error("info", e))?;

        let (width, height, size_bytes) = raw
            .exif_info
            .as_ref()
            .map(|e| (e.exif_image_width, e.exif_image_height, e.file_size_in_byte))
            .unwrap_or((None, None, None));

        Ok(LibraryAssetInfo {
            mime: raw
                .original_mime_type
                .clone()
                .unwrap_or_else(|| "image/jpeg".to_string()),
            filename: raw.original_file_name.unwrap_or_else(|| raw.id.clone()),
            width,
            height,
            captured_at: raw.file_created_at,
            size_bytes,
        })
    }

    /// Fetch a downsized rendition, preferred for interactive latency.
    #[tracing::instrument(skip(self))]
    pub async fn thumbnail(
        &self,
        external_id: &str,
        format: &str,
        size: &str,
    ) -> Result<Bytes, AppError> {
        let response = self
            .get(&format!("/assets/{}/thumbnail", external_id))
            .query(&[("format", format), ("size", size)])
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| Self::map_send_error("thumbnail", e))?;
        let response = Self::check_status("thumbnail", response).await?;
        response
            .bytes()
            .await
            .map_err(|e| Self::map_send_error("thumbnail", e))
    }

    #[tracing::instrument(skip(self))]
    pub async fn original(&self, external_id: &str) -> Result<Bytes, AppError> {
        let response = self
            .get(&format!("/assets/{}/original", external_id))
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| Self::map_send_error("original", e))?;
        let response = Self::check_status("original", response).await?;
        response
            .bytes()
            .await
            .map_err(|e| Self::map_send_error("original", e))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_timeline(&self) -> Result<Vec<TimelineBucket>, AppError> {
        let response = self
            .get("/timeline/buckets")
            .send()
            .await
            .map_err(|e| Self::map_send_error("list_timeline", e))?;
        let response = Self::check_status("list_timeline", response).await?;
        response
            .json()
            .await
            .map_err(|e| Self::map_send_error("list_timeline", e))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_bucket(&self, bucket: &str) -> Result<Vec<LibraryAsset>, AppError> {
        let response = self
            .get("/timeline/bucket")
            .query(&[("timeBucket", bucket)])
            .send()
            .await
            .map_err(|e| Self::map_send_error("list_bucket", e))?;
        let response = Self::check_status("list_bucket", response).await?;
        let bucket: BucketResponse = response
            .json()
            .await
            .map_err(|e| Self::map_send_error("list_bucket", e))?;
        Ok(transpose_bucket(bucket))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transpose_columnar_bucket() {
        let json = r#"{
            "id": ["a1", "a2", "a3"],
            "isImage": [true, false, true],
            "originalFileName": ["one.jpg", "two.mp4", "three.jpg"],
            "fileCreatedAt": ["2024-05-01T10:00:00Z", null, "2024-05-02T11:30:00Z"],
            "width": [4000, null, 1920],
            "height": [3000, null, 1080]
        }"#;
        let response: BucketResponse = serde_json::from_str(json).unwrap();
        let assets = transpose_bucket(response);

        assert_eq!(assets.len(), 3);
        assert_eq!(assets[0].id, "a1");
        assert_eq!(assets[0].kind, MediaKind::Photo);
        assert_eq!(assets[0].original_file_name, "one.jpg");
        assert_eq!(assets[0].width, Some(4000));
        assert_eq!(assets[1].kind, MediaKind::Video);
        assert_eq!(assets[1].captured_at, None);
        assert_eq!(assets[2].height, Some(1080));
    }

    #[test]
    fn transpose_row_bucket() {
        let json = r#"[
            {"id": "a1", "type": "IMAGE", "originalFileName": "one.jpg",
             "fileCreatedAt": "2024-05-01T10:00:00Z",
             "exifInfo": {"exifImageWidth": 800, "exifImageHeight": 600}},
            {"id": "a2", "type": "VIDEO"}
        ]"#;
        let response: BucketResponse = serde_json::from_str(json).unwrap();
        let assets = transpose_bucket(response);

        assert_eq!(assets.len(), 2);
        assert_eq!(assets[0].kind, MediaKind::Photo);
        assert_eq!(assets[0].width, Some(800));
        assert_eq!(assets[1].kind, MediaKind::Video);
        // Missing filename falls back to the id.
        assert_eq!(assets[1].original_file_name, "a2");
    }

    #[test]
    fn transpose_columnar_with_missing_columns() {
        let json = r#"{"id": ["a1", "a2"]}"#;
        let response: BucketResponse = serde_json::from_str(json).unwrap();
        let assets = transpose_bucket(response);
        assert_eq!(assets.len(), 2);
        assert_eq!(assets[0].kind, MediaKind::Photo);
        assert_eq!(assets[0].original_file_name, "a1");
        assert_eq!(assets[0].width, None);
    }

    #[tokio::test]
    async fn requests_carry_bearer_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ping")
            .match_header("authorization", "Bearer shared-secret")
            .with_status(200)
            .with_body(r#"{"res":"pong"}"#)
            .create_async()
            .await;

        let client = LibraryClient::new(server.url(), "shared-secret").unwrap();
        client.test().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn bad_credentials_map_to_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/ping")
            .with_status(401)
            .create_async()
            .await;

        let client = LibraryClient::new(server.url(), "wrong").unwrap();
        let err = client.test().await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn unknown_asset_maps_to_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/assets/ghost")
            .with_status(404)
            .create_async()
            .await;

        let client = LibraryClient::new(server.url(), "key").unwrap();
        let err = client.info("ghost").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn info_parses_exif_dimensions() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/assets/a1")
            .with_status(200)
            .with_body(
                r#"{"id":"a1","type":"IMAGE","originalFileName":"sunset.jpg",
                    "originalMimeType":"image/jpeg",
                    "fileCreatedAt":"2024-05-01T10:00:00Z",
                    "exifInfo":{"exifImageWidth":4032,"exifImageHeight":3024,"fileSizeInByte":2097152}}"#,
            )
            .create_async()
            .await;

        let client = LibraryClient::new(server.url(), "key").unwrap();
        let info = client.info("a1").await.unwrap();
        assert_eq!(info.filename, "sunset.jpg");
        assert_eq!(info.mime, "image/jpeg");
        assert_eq!(info.width, Some(4032));
        assert_eq!(info.size_bytes, Some(2_097_152));
    }

    #[tokio::test]
    async fn version_formats_semver_object() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/version")
            .with_status(200)
            .with_body(r#"{"major":1,"minor":99,"patch":0}"#)
            .create_async()
            .await;

        let client = LibraryClient::new(server.url(), "key").unwrap();
        assert_eq!(client.version().await.unwrap(), "1.99.0");
    }

    #[tokio::test]
    async fn thumbnail_passes_format_and_size() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/assets/a1/thumbnail?format=webp&size=preview")
            .with_status(200)
            .with_body(&b"webp-bytes"[..])
            .create_async()
            .await;

        let client = LibraryClient::new(server.url(), "key").unwrap();
        let bytes = client.thumbnail("a1", "webp", "preview").await.unwrap();
        assert_eq!(bytes, Bytes::from_static(b"webp-bytes"));
        mock.assert_async().await;
    }
}
