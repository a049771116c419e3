//! cidgate - HTTP upload gateway for CID-assigning object stores
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - x-api-key guard (runs before the body is read)           │
//! │  - POST /upload, GET /uploads/{key}/cid                     │
//! │  - GET /, GET /healthz, GET /metrics                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      CID Poller                              │
//! │  - bounded exponential backoff on object metadata           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Object Storage (S3 API)                    │
//! │  - PutObject / HeadObject                                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `poller`: waits for the backend-assigned CID
//! - `storage`: `ObjectStore` trait and the S3 implementation
//! - `auth`: shared-secret middleware
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod poller;
pub mod storage;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Application state shared across all handlers
///
/// Cloned for each request. Built once at startup; tests swap in their own
/// `ObjectStore`.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Object storage client
    pub store: Arc<dyn storage::ObjectStore>,

    /// Bounds for CID polling, derived from `config.poll`
    pub poll_policy: Arc<poller::PollPolicy>,

    /// Cancelled on shutdown; in-flight polls stop at their next await
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Initialize application state with the S3 storage client
    ///
    /// # Errors
    /// Returns error if the storage client cannot be configured
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let store = storage::S3Store::new(&config.storage)?;
        tracing::info!("Object storage initialized");

        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Initialize application state around an existing storage client
    pub fn with_store(config: config::AppConfig, store: Arc<dyn storage::ObjectStore>) -> Self {
        let poll_policy = poller::PollPolicy::from(&config.poll);

        Self {
            config: Arc::new(config),
            store,
            poll_policy: Arc::new(poll_policy),
            shutdown: CancellationToken::new(),
        }
    }
}

/// Slack on top of the file limit for multipart boundaries and headers
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{
        Router,
        extract::DefaultBodyLimit,
        middleware,
        routing::{get, post},
    };
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.server);
    let body_limit = state
        .config
        .upload
        .max_size_bytes()
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let protected = Router::new()
        .route(
            "/upload",
            post(api::upload).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/uploads/:key/cid", get(api::cid_status))
        .merge(api::metrics_router())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        .route("/", get(root))
        .route("/healthz", get(health_check))
        .merge(protected)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if !server.is_production() {
        return CorsLayer::permissive();
    }

    let allowed_origin = url::Url::parse(&server.public_url)
        .map(|url| url.origin().ascii_serialization())
        .unwrap_or_else(|_| server.base_url().to_string());

    match HeaderValue::from_str(&allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods(Any)
            .allow_headers(Any),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse CORS origin from public URL; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

async fn root(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> axum::Json<api::RootResponse> {
    axum::Json(api::RootResponse {
        environment: state.config.server.environment.clone(),
    })
}

async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> axum::Json<api::HealthResponse> {
    axum::Json(api::HealthResponse {
        ok: true,
        environment: state.config.server.environment.clone(),
    })
}
