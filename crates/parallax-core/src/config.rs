//! Configuration module
//!
//! Environment-driven configuration for the orchestrator. `.env` files are
//! honored via dotenvy; every knob has a default except the collaborator
//! endpoints that cannot be guessed.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 4000;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MODEL_TIMEOUT_AUTO_MS: u64 = 30 * 60 * 1000;
const MODEL_TIMEOUT_MANUAL_MS: u64 = 10 * 60 * 1000;
const WORKER_TICK_MS: u64 = 5000;
const EVENT_BUS_CAPACITY: usize = 256;
const CACHE_WRITE_QUEUE: usize = 16;
const MAX_UPLOAD_SIZE_MB: usize = 100;

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    /// Base URL of the inference service.
    pub ai_service_url: String,
    /// Base URL of the external media library; None disables the adapter.
    pub library_url: Option<String>,
    pub library_api_key: Option<String>,
    pub upload_dir: PathBuf,
    pub artifact_dir: PathBuf,
    pub model_timeout_auto: Duration,
    pub model_timeout_manual: Duration,
    pub auto_start_worker: bool,
    pub worker_tick: Duration,
    pub experimental_video: bool,
    pub default_model: String,
    pub event_bus_capacity: usize,
    pub cache_write_queue: usize,
    pub max_upload_size_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        // Best-effort .env load; absence is normal in deployment.
        dotenvy::dotenv().ok();

        let database_url = match env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => database_url_from_parts()?,
        };

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        Ok(Config {
            server_port: env::var("PORT")
                .or_else(|_| env::var("SERVER_PORT"))
                .unwrap_or_else(|_| DEFAULT_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            database_url,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            ai_service_url: env::var("AI_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string())
                .trim_end_matches('/')
                .to_string(),
            library_url: env::var("LIBRARY_URL")
                .ok()
                .map(|u| u.trim_end_matches('/').to_string()),
            library_api_key: env::var("LIBRARY_API_KEY").ok(),
            upload_dir: env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "./data/uploads".to_string())
                .into(),
            artifact_dir: env::var("ARTIFACT_DIR")
                .unwrap_or_else(|_| "./data/artifacts".to_string())
                .into(),
            model_timeout_auto: Duration::from_millis(
                env::var("MODEL_TIMEOUT_AUTO_MS")
                    .unwrap_or_else(|_| MODEL_TIMEOUT_AUTO_MS.to_string())
                    .parse()
                    .map_err(|_| anyhow::anyhow!("MODEL_TIMEOUT_AUTO_MS must be milliseconds"))?,
            ),
            model_timeout_manual: Duration::from_millis(
                env::var("MODEL_TIMEOUT_MANUAL_MS")
                    .unwrap_or_else(|_| MODEL_TIMEOUT_MANUAL_MS.to_string())
                    .parse()
                    .map_err(|_| {
                        anyhow::anyhow!("MODEL_TIMEOUT_MANUAL_MS must be milliseconds")
                    })?,
            ),
            auto_start_worker: env::var("AUTO_START_WORKER")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(true),
            worker_tick: Duration::from_millis(
                env::var("WORKER_TICK_MS")
                    .unwrap_or_else(|_| WORKER_TICK_MS.to_string())
                    .parse()
                    .unwrap_or(WORKER_TICK_MS),
            ),
            experimental_video: env::var("EXPERIMENTAL_VIDEO")
                .unwrap_or_else(|_| "false".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(false),
            default_model: env::var("DEFAULT_MODEL").unwrap_or_else(|_| "base".to_string()),
            event_bus_capacity: env::var("EVENT_BUS_CAPACITY")
                .unwrap_or_else(|_| EVENT_BUS_CAPACITY.to_string())
                .parse()
                .unwrap_or(EVENT_BUS_CAPACITY),
            cache_write_queue: env::var("CACHE_WRITE_QUEUE")
                .unwrap_or_else(|_| CACHE_WRITE_QUEUE.to_string())
                .parse()
                .unwrap_or(CACHE_WRITE_QUEUE),
            max_upload_size_bytes: env::var("MAX_UPLOAD_SIZE_MB")
                .unwrap_or_else(|_| MAX_UPLOAD_SIZE_MB.to_string())
                .parse()
                .unwrap_or(MAX_UPLOAD_SIZE_MB)
                * 1024
                * 1024,
        })
    }

    /// Library adapter credentials when configured.
    pub fn library(&self) -> Option<(&str, &str)> {
        match (self.library_url.as_deref(), self.library_api_key.as_deref()) {
            (Some(url), Some(key)) => Some((url, key)),
            _ => None,
        }
    }
}

/// Assemble a Postgres URL from the individual DB_* variables.
fn database_url_from_parts() -> Result<String, anyhow::Error> {
    let host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
    let name = env::var("DB_NAME").unwrap_or_else(|_| "parallax".to_string());
    let user = env::var("DB_USER").unwrap_or_else(|_| "postgres".to_string());
    let password = env::var("DB_PASSWORD")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL or DB_PASSWORD must be set"))?;

    Ok(format!(
        "postgresql://{}:{}@{}:{}/{}",
        user, password, host, port, name
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; keep them in one test to avoid
    // interference under the parallel test runner.
    #[test]
    fn config_from_env_defaults_and_overrides() {
        env::set_var("DATABASE_URL", "postgresql://p:p@localhost/parallax");
        env::remove_var("PORT");
        env::remove_var("SERVER_PORT");
        env::set_var("AI_SERVICE_URL", "http://inference:8000/");
        env::set_var("MODEL_TIMEOUT_MANUAL_MS", "600000");
        env::remove_var("LIBRARY_URL");

        let config = Config::from_env().expect("config should parse");
        assert_eq!(config.server_port, DEFAULT_PORT);
        // Trailing slash is trimmed so URL joining stays predictable.
        assert_eq!(config.ai_service_url, "http://inference:8000");
        assert_eq!(config.model_timeout_manual, Duration::from_secs(600));
        assert_eq!(config.model_timeout_auto, Duration::from_secs(1800));
        assert_eq!(config.worker_tick, Duration::from_millis(5000));
        assert!(!config.experimental_video);
        assert_eq!(config.default_model, "base");
        assert!(config.library().is_none());

        env::set_var("LIBRARY_URL", "http://photos:2283/api");
        env::set_var("LIBRARY_API_KEY", "secret");
        let config = Config::from_env().expect("config should parse");
        assert_eq!(
            config.library(),
            Some(("http://photos:2283/api", "secret"))
        );
    }
}
