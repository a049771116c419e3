//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub upload: UploadConfig,
    pub poll: PollConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Runtime mode reported by `/` and `/healthz` ("development", "production", ...)
    pub environment: String,
    /// Public base URL of this gateway, used for follow-up links
    /// e.g., "https://upload.example.com"
    pub public_url: String,
}

impl ServerConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Public base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.public_url.trim_end_matches('/')
    }
}

/// S3-compatible object storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// S3 API endpoint, e.g. "https://s3.filebase.com"
    pub endpoint: String,
    /// Signing region
    pub region: String,
    /// Bucket that receives uploads
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Use path-style addressing (`endpoint/bucket/key`)
    #[serde(default = "default_force_path_style")]
    pub force_path_style: bool,
    /// Public IPFS gateway used to build `gateway_url`
    pub ipfs_gateway_url: String,
}

fn default_force_path_style() -> bool {
    true
}

/// Shared-secret authentication
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Value expected in the `x-api-key` header
    pub api_key: String,
}

/// Upload limits
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Maximum accepted file size in megabytes
    pub max_size_mb: usize,
    /// Optional prefix prepended to every object key
    #[serde(default)]
    pub key_prefix: Option<String>,
}

impl UploadConfig {
    pub fn max_size_bytes(&self) -> usize {
        self.max_size_mb.saturating_mul(1024 * 1024)
    }
}

/// CID polling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    /// Total wait budget per upload (default: 30000)
    pub max_wait_ms: u64,
    /// Optional cap on metadata lookups per upload
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// First backoff delay (default: 500)
    pub initial_delay_ms: u64,
    /// Backoff ceiling (default: 4000)
    pub max_delay_ms: u64,
    /// Upper bound for a single metadata lookup (default: 5000)
    pub attempt_timeout_ms: u64,
}

impl PollConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub fn default_filter(&self) -> String {
        format!("cidgate={},tower_http=debug", self.level.trim())
    }

    pub fn is_json(&self) -> bool {
        self.format.trim().eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (CIDGATE__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.environment", "development")?
            .set_default("server.public_url", "http://localhost:3000")?
            .set_default("storage.endpoint", "https://s3.filebase.com")?
            .set_default("storage.region", "us-east-1")?
            .set_default("storage.force_path_style", true)?
            .set_default("storage.ipfs_gateway_url", "https://ipfs.filebase.io")?
            .set_default("upload.max_size_mb", 100)?
            .set_default("poll.max_wait_ms", 30_000)?
            .set_default("poll.initial_delay_ms", 500)?
            .set_default("poll.max_delay_ms", 4_000)?
            .set_default("poll.attempt_timeout_ms", 5_000)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("CIDGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        if self.auth.api_key.trim().is_empty() {
            return Err(AppError::Config("auth.api_key must not be empty".to_string()));
        }

        if self.storage.bucket.trim().is_empty() {
            return Err(AppError::Config("storage.bucket must not be empty".to_string()));
        }

        if self.upload.max_size_mb == 0 {
            return Err(AppError::Config(
                "upload.max_size_mb must be greater than 0".to_string(),
            ));
        }

        if self.poll.max_wait_ms == 0 {
            return Err(AppError::Config(
                "poll.max_wait_ms must be greater than 0".to_string(),
            ));
        }

        if self.poll.initial_delay_ms == 0 || self.poll.initial_delay_ms > self.poll.max_delay_ms {
            return Err(AppError::Config(
                "poll.initial_delay_ms must be between 1 and poll.max_delay_ms".to_string(),
            ));
        }

        if self.poll.max_attempts == Some(0) {
            return Err(AppError::Config(
                "poll.max_attempts must be greater than 0 when set".to_string(),
            ));
        }

        url::Url::parse(&self.server.public_url).map_err(|e| {
            AppError::Config(format!("server.public_url is not a valid URL: {e}"))
        })?;

        if !self.server.is_production() {
            tracing::warn!(
                environment = %self.server.environment,
                "Running outside production: CORS is permissive"
            );
        }

        Ok(())
    }
}
