//! HTTP error response conversion
//!
//! **Handler pattern:** return `Result<impl IntoResponse, HttpAppError>` and
//! let `AppError` values flow through `?`; they render with a consistent
//! status, JSON body, and log level.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use parallax_core::{AppError, ErrorMetadata, LogLevel};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error kind, e.g. "NotFound"
    pub error: String,
    /// Human-readable description
    pub message: String,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether retrying the request can succeed
    pub recoverable: bool,
}

/// Wrapper for AppError so it can implement the external IntoResponse trait.
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

fn log_error(error: &AppError) {
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(code = error.error_code(), "{}", error.detailed_message())
        }
        LogLevel::Warn => {
            tracing::warn!(code = error.error_code(), "{}", error.detailed_message())
        }
        LogLevel::Error => {
            tracing::error!(code = error.error_code(), "{}", error.detailed_message())
        }
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let error = self.0;
        log_error(&error);

        let status = StatusCode::from_u16(error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse {
            error: error.error_type().to_string(),
            message: error.client_message(),
            code: error.error_code().to_string(),
            recoverable: error.is_retryable(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_renders_404() {
        let response =
            HttpAppError(AppError::NotFound("media gone".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unreachable_renders_503() {
        let response = HttpAppError(AppError::Unreachable {
            service: "inference".to_string(),
            message: "refused".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn enqueue_precondition_renders_400() {
        let response = HttpAppError(AppError::AlreadyQueued {
            media_id: uuid::Uuid::nil(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
