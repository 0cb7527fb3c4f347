//! Error types module
//!
//! All orchestration errors are unified under the `AppError` enum. The
//! `ErrorMetadata` trait lets each error self-describe its HTTP rendering,
//! machine code, retryability and log level, so the REST facade and the
//! worker's retry policy both read from one source of truth.

use std::io;

use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected errors like enqueue preconditions and validation failures
    Debug,
    /// Recoverable issues like unreachable collaborators
    Warn,
    /// Unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented.
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "ALREADY_QUEUED")
    fn error_code(&self) -> &'static str;

    /// Whether the operation may succeed if repeated (drives queue requeue)
    fn is_retryable(&self) -> bool;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Media {media_id} already has an active job")]
    AlreadyQueued { media_id: uuid::Uuid },

    #[error("Media {media_id} has already been processed")]
    AlreadyProcessed { media_id: uuid::Uuid },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model '{model_key}' is not downloaded")]
    NotDownloaded { model_key: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{service} unreachable: {message}")]
    Unreachable { service: String, message: String },

    #[error("Remote service returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        match err {
            SqlxError::RowNotFound => AppError::NotFound("row not found".to_string()),
            other => AppError::Database(other),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Storage(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::NotFound(_) => "NotFound",
            AppError::AlreadyQueued { .. } => "AlreadyQueued",
            AppError::AlreadyProcessed { .. } => "AlreadyProcessed",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::NotDownloaded { .. } => "NotDownloaded",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Unreachable { .. } => "Unreachable",
            AppError::Remote { .. } => "Remote",
            AppError::Timeout { .. } => "Timeout",
            AppError::Conflict(_) => "Conflict",
            AppError::Storage(_) => "Storage",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        match self {
            AppError::Database(_) => 500,
            AppError::NotFound(_) => 404,
            AppError::AlreadyQueued { .. } => 400,
            AppError::AlreadyProcessed { .. } => 400,
            AppError::InvalidInput(_) => 400,
            AppError::NotDownloaded { .. } => 409,
            AppError::Unauthorized(_) => 401,
            AppError::Unreachable { .. } => 503,
            AppError::Remote { .. } => 502,
            AppError::Timeout { .. } => 504,
            AppError::Conflict(_) => 409,
            AppError::Storage(_) => 500,
            AppError::Internal(_) => 500,
            AppError::InternalWithSource { .. } => 500,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::AlreadyQueued { .. } => "ALREADY_QUEUED",
            AppError::AlreadyProcessed { .. } => "ALREADY_PROCESSED",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::NotDownloaded { .. } => "MODEL_NOT_DOWNLOADED",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Unreachable { .. } => "SERVICE_UNREACHABLE",
            AppError::Remote { .. } => "REMOTE_ERROR",
            AppError::Timeout { .. } => "TIMEOUT",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::InternalWithSource { .. } => "INTERNAL_ERROR",
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            AppError::Database(_) => true,
            AppError::NotFound(_) => false,
            AppError::AlreadyQueued { .. } => false,
            AppError::AlreadyProcessed { .. } => false,
            AppError::InvalidInput(_) => false,
            AppError::NotDownloaded { .. } => false,
            AppError::Unauthorized(_) => false,
            AppError::Unreachable { .. } => true,
            // A collaborator 4xx means our input was bad; repeating it cannot help.
            AppError::Remote { status, .. } => *status >= 500,
            AppError::Timeout { .. } => true,
            AppError::Conflict(_) => true,
            AppError::Storage(_) => true,
            AppError::Internal(_) => true,
            AppError::InternalWithSource { .. } => true,
        }
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
            AppError::Storage(_) => "Failed to access artifact storage".to_string(),
            other => other.to_string(),
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            AppError::Database(_) => LogLevel::Error,
            AppError::NotFound(_) => LogLevel::Debug,
            AppError::AlreadyQueued { .. } => LogLevel::Debug,
            AppError::AlreadyProcessed { .. } => LogLevel::Debug,
            AppError::InvalidInput(_) => LogLevel::Debug,
            AppError::NotDownloaded { .. } => LogLevel::Debug,
            AppError::Unauthorized(_) => LogLevel::Debug,
            AppError::Unreachable { .. } => LogLevel::Warn,
            AppError::Remote { .. } => LogLevel::Warn,
            AppError::Timeout { .. } => LogLevel::Warn,
            AppError::Conflict(_) => LogLevel::Warn,
            AppError::Storage(_) => LogLevel::Error,
            AppError::Internal(_) => LogLevel::Error,
            AppError::InternalWithSource { .. } => LogLevel::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_error_metadata() {
        let err = AppError::from(sqlx::Error::PoolClosed);
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert!(err.is_retryable());
        assert_eq!(err.client_message(), "Failed to access database");
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn row_not_found_becomes_not_found() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert_eq!(err.http_status_code(), 404);
    }

    #[test]
    fn enqueue_preconditions_are_client_errors() {
        let media_id = uuid::Uuid::new_v4();
        let queued = AppError::AlreadyQueued { media_id };
        assert_eq!(queued.http_status_code(), 400);
        assert!(!queued.is_retryable());
        assert_eq!(queued.log_level(), LogLevel::Debug);

        let processed = AppError::AlreadyProcessed { media_id };
        assert_eq!(processed.http_status_code(), 400);
        assert_eq!(processed.error_code(), "ALREADY_PROCESSED");
    }

    #[test]
    fn remote_retryability_splits_on_status() {
        let server = AppError::Remote {
            status: 503,
            message: "overloaded".to_string(),
        };
        assert!(server.is_retryable());

        let client = AppError::Remote {
            status: 400,
            message: "bad image".to_string(),
        };
        assert!(!client.is_retryable());
        assert_eq!(client.http_status_code(), 502);
    }

    #[test]
    fn unreachable_and_timeout_are_retryable() {
        let unreachable = AppError::Unreachable {
            service: "inference".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(unreachable.is_retryable());
        assert_eq!(unreachable.http_status_code(), 503);
        assert_eq!(unreachable.log_level(), LogLevel::Warn);

        let timeout = AppError::Timeout {
            operation: "process_depth".to_string(),
        };
        assert!(timeout.is_retryable());
        assert_eq!(timeout.http_status_code(), 504);
    }

    #[test]
    fn not_downloaded_carries_model_key() {
        let err = AppError::NotDownloaded {
            model_key: "large".to_string(),
        };
        assert!(err.to_string().contains("large"));
        assert_eq!(err.http_status_code(), 409);
        assert_eq!(err.error_code(), "MODEL_NOT_DOWNLOADED");
    }
}
