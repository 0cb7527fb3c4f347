//! Inference service client.
//!
//! The one place that knows the inference wire contract: model lifecycle
//! endpoints plus multipart image upload for depth and splat processing.
//! Errors map onto the shared taxonomy (Unreachable / Timeout / Remote) and
//! are never retried here.

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;

use parallax_core::AppError;

/// Deadline for model/metadata endpoints.
const METADATA_TIMEOUT: Duration = Duration::from_secs(30);
/// Deadline for single-image depth inference.
const DEPTH_TIMEOUT: Duration = Duration::from_secs(120);
/// Deadline for splat generation and other video-class operations.
const HEAVY_TIMEOUT: Duration = Duration::from_secs(15 * 60);
/// Cap on remote error bodies carried into error messages.
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub model_status: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.as_str(), "ok" | "healthy")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteModel {
    pub key: String,
    #[serde(default)]
    pub is_downloaded: bool,
    #[serde(default)]
    pub is_loaded: bool,
    #[serde(default)]
    pub size_bytes: Option<i64>,
    #[serde(default)]
    pub download_progress: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<RemoteModel>,
}

#[derive(Debug, Deserialize)]
struct CurrentModelResponse {
    current_model: Option<String>,
}

#[derive(Clone, Debug)]
pub struct InferenceClient {
    client: reqwest::Client,
    base_url: String,
}

impl InferenceClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn map_send_error(operation: &str, err: reqwest::Error) -> AppError {
        if err.is_timeout() {
            AppError::Timeout {
                operation: operation.to_string(),
            }
        } else {
            AppError::Unreachable {
                service: "inference".to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Turn a non-2xx response into `Remote { status, message }`.
    async fn check_status(
        operation: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, AppError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let mut body = response.text().await.unwrap_or_default();
        body.truncate(ERROR_BODY_LIMIT);
        tracing::warn!(
            operation = operation,
            status = status.as_u16(),
            body = %body,
            "Inference service returned an error"
        );
        Err(AppError::Remote {
            status: status.as_u16(),
            message: body,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn health(&self) -> Result<HealthStatus, AppError> {
        let response = self
            .client
            .get(self.url("/health"))
            .timeout(METADATA_TIMEOUT)
            .send()
            .await
            .map_err(|e| Self::map_send_error("health", e))?;

        let response = Self::check_status("health", response).await?;
        Ok(response
            .json()
            .await
            .map_err(|e| Self::map_send_error("health", e))?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_models(&self) -> Result<Vec<RemoteModel>, AppError> {
        let response = self
            .client
            .get(self.url("/api/models"))
            .timeout(METADATA_TIMEOUT)
            .send()
            .await
            .map_err(|e| Self::map_send_error("list_models", e))?;

        let response = Self::check_status("list_models", response).await?;
        let models: ModelsResponse = response
            .json()
            .await
            .map_err(|e| Self::map_send_error("list_models", e))?;
        Ok(models.models)
    }

    /// The model currently resident on the inference side, if any.
    #[tracing::instrument(skip(self))]
    pub async fn current_loaded(&self) -> Result<Option<String>, AppError> {
        let response = self
            .client
            .get(self.url("/api/models/current"))
            .timeout(METADATA_TIMEOUT)
            .send()
            .await
            .map_err(|e| Self::map_send_error("current_loaded", e))?;

        let response = Self::check_status("current_loaded", response).await?;
        let current: CurrentModelResponse = response
            .json()
            .await
            .map_err(|e| Self::map_send_error("current_loaded", e))?;
        Ok(current.current_model)
    }

    /// Trigger a model download. The service answers 202 and reports
    /// progress through `list_models`.
    #[tracing::instrument(skip(self))]
    pub async fn download(&self, model_key: &str) -> Result<(), AppError> {
        let response = self
            .client
            .post(self.url(&format!("/api/models/{}/download", model_key)))
            .timeout(METADATA_TIMEOUT)
            .send()
            .await
            .map_err(|e| Self::map_send_error("download", e))?;

        Self::check_status("download", response).await?;
        Ok(())
    }

    /// Load a model, optionally onto a specific device.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self, model_key: &str, device: Option<&str>) -> Result<(), AppError> {
        let body = match device {
            Some(device) => serde_json::json!({ "device": device }),
            None => serde_json::json!({}),
        };

        let response = self
            .client
            .post(self.url(&format!("/api/models/{}/load", model_key)))
            .timeout(METADATA_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::map_send_error("load", e))?;

        Self::check_status("load", response).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn unload(&self, model_key: &str) -> Result<(), AppError> {
        let response = self
            .client
            .post(self.url(&format!("/api/models/{}/unload", model_key)))
            .timeout(METADATA_TIMEOUT)
            .send()
            .await
            .map_err(|e| Self::map_send_error("unload", e))?;

        Self::check_status("unload", response).await?;
        Ok(())
    }

    /// Run depth inference on one image; returns PNG bytes.
    #[tracing::instrument(skip(self, image), fields(image_bytes = image.len()))]
    pub async fn process_depth(
        &self,
        image: Bytes,
        model_key: Option<&str>,
    ) -> Result<Bytes, AppError> {
        self.process(image, model_key, "/api/depth", DEPTH_TIMEOUT, "process_depth")
            .await
    }

    /// Run splat generation on one image; returns PLY bytes.
    #[tracing::instrument(skip(self, image), fields(image_bytes = image.len()))]
    pub async fn process_splat(
        &self,
        image: Bytes,
        model_key: Option<&str>,
    ) -> Result<Bytes, AppError> {
        self.process(image, model_key, "/api/splat", HEAVY_TIMEOUT, "process_splat")
            .await
    }

    async fn process(
        &self,
        image: Bytes,
        model_key: Option<&str>,
        path: &str,
        timeout: Duration,
        operation: &'static str,
    ) -> Result<Bytes, AppError> {
        let part = Part::bytes(image.to_vec())
            .file_name("image")
            .mime_str("application/octet-stream")
            .map_err(|e| AppError::Internal(format!("failed to build multipart: {}", e)))?;
        let form = Form::new().part("image", part);

        let mut request = self
            .client
            .post(self.url(path))
            .timeout(timeout)
            .multipart(form);
        if let Some(key) = model_key {
            request = request.query(&[("model", key)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::map_send_error(operation, e))?;

        let response = Self::check_status(operation, response).await?;
        response
            .bytes()
            .await
            .map_err(|e| Self::map_send_error(operation, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parallax_core::ErrorMetadata;

    #[tokio::test]
    async fn health_parses_status() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(r#"{"status":"ok","model_status":"idle"}"#)
            .create_async()
            .await;

        let client = InferenceClient::new(server.url()).unwrap();
        let health = client.health().await.unwrap();
        assert!(health.is_healthy());
        assert_eq!(health.model_status.as_deref(), Some("idle"));
    }

    #[tokio::test]
    async fn list_models_parses_catalog() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/models")
            .with_status(200)
            .with_body(
                r#"{"models":[
                    {"key":"small","is_downloaded":true,"is_loaded":false},
                    {"key":"large","is_downloaded":false,"is_loaded":false,"download_progress":12.5}
                ]}"#,
            )
            .create_async()
            .await;

        let client = InferenceClient::new(server.url()).unwrap();
        let models = client.list_models().await.unwrap();
        assert_eq!(models.len(), 2);
        assert!(models[0].is_downloaded);
        assert_eq!(models[1].download_progress, Some(12.5));
    }

    #[tokio::test]
    async fn current_loaded_handles_none() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/models/current")
            .with_status(200)
            .with_body(r#"{"current_model":null}"#)
            .create_async()
            .await;

        let client = InferenceClient::new(server.url()).unwrap();
        assert_eq!(client.current_loaded().await.unwrap(), None);
    }

    #[tokio::test]
    async fn process_depth_uploads_multipart_and_returns_bytes() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/depth?model=small")
            .match_header(
                "content-type",
                mockito::Matcher::Regex("multipart/form-data.*".to_string()),
            )
            .with_status(200)
            .with_body(&b"png-bytes"[..])
            .create_async()
            .await;

        let client = InferenceClient::new(server.url()).unwrap();
        let result = client
            .process_depth(Bytes::from_static(b"jpeg-bytes"), Some("small"))
            .await
            .unwrap();
        assert_eq!(result, Bytes::from_static(b"png-bytes"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_maps_to_retryable_remote() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/depth")
            .with_status(503)
            .with_body("model busy")
            .create_async()
            .await;

        let client = InferenceClient::new(server.url()).unwrap();
        let err = client
            .process_depth(Bytes::from_static(b"x"), None)
            .await
            .unwrap_err();
        match &err {
            AppError::Remote { status, message } => {
                assert_eq!(*status, 503);
                assert!(message.contains("model busy"));
            }
            other => panic!("expected Remote, got {:?}", other),
        }
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn client_error_maps_to_non_retryable_remote() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/depth")
            .with_status(400)
            .with_body("bad image")
            .create_async()
            .await;

        let client = InferenceClient::new(server.url()).unwrap();
        let err = client
            .process_depth(Bytes::from_static(b"x"), None)
            .await
            .unwrap_err();
        match &err {
            AppError::Remote { status, message } => {
                assert_eq!(*status, 400);
                assert!(message.contains("bad image"));
            }
            other => panic!("expected Remote, got {:?}", other),
        }
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn connection_refused_maps_to_unreachable() {
        // Port 1 is never listening.
        let client = InferenceClient::new("http://127.0.0.1:1").unwrap();
        let err = client.health().await.unwrap_err();
        assert!(matches!(err, AppError::Unreachable { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn load_posts_device_hint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/models/base/load")
            .match_body(mockito::Matcher::Json(
                serde_json::json!({ "device": "cuda:1" }),
            ))
            .with_status(200)
            .with_body(r#"{"current_model":"base"}"#)
            .create_async()
            .await;

        let client = InferenceClient::new(server.url()).unwrap();
        client.load("base", Some("cuda:1")).await.unwrap();
        mock.assert_async().await;
    }
}
