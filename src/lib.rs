//! Platzigram - a small photo sharing site
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Feed, posts, users, profile endpoints                    │
//! │  - Site pages, health, metrics                              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Signup, login, sessions                                  │
//! │  - Feed pagination, post creation, profile updates          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx)                                            │
//! │  - Local media directory                                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers and response DTOs
//! - `service`: Business logic layer
//! - `forms`: Form validation
//! - `data`: Database layer
//! - `storage`: Media file storage
//! - `auth`: Password hashing, signed sessions, auth middleware
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod forms;
pub mod metrics;
pub mod service;
pub mod storage;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Cloned for each request; every resource sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Uploaded media on disk
    pub storage: Arc<storage::MediaStorage>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database (runs migrations)
    /// 2. Prepare the media directory
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = data::Database::connect(&config.database.path).await?;
        tracing::info!("Database connected");

        let storage = storage::MediaStorage::new(&config.media).await?;
        tracing::info!(root = %storage.root().display(), "Media storage initialized");

        metrics::USERS_TOTAL.set(db.count_users().await?);

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db: Arc::new(db),
            storage: Arc::new(storage),
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{compression::CompressionLayer, services::ServeDir, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.server);
    let media_url = state.config.media.url.trim_end_matches('/').to_string();
    let media = ServeDir::new(state.storage.root());

    Router::new()
        .merge(api::site_router())
        .merge(api::posts_router(state.clone()))
        .nest("/users", api::users_router(state.clone()))
        .nest_service(&media_url, media)
        .merge(api::metrics_router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if !server.protocol.eq_ignore_ascii_case("https") {
        return CorsLayer::permissive();
    }

    let allowed_origin = server.base_url();
    match HeaderValue::from_str(&allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods(Any)
            .allow_headers(Any),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse CORS origin from server base URL; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

/// Spawn the task that purges expired sessions
///
/// Runs every `auth.session_cleanup_interval_seconds` until the runtime
/// shuts down.
pub fn spawn_session_cleanup_task(state: AppState) -> tokio::task::JoinHandle<()> {
    let interval_secs = state.config.auth.session_cleanup_interval_seconds.max(1);

    let users = service::UserService::new(
        state.db.clone(),
        state.storage.clone(),
        state.config.auth.clone(),
    );

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));

        loop {
            interval.tick().await;

            match users.purge_expired_sessions().await {
                Ok(0) => tracing::debug!("No expired sessions to purge"),
                Ok(purged) => {
                    metrics::SESSIONS_PURGED_TOTAL.inc_by(purged);
                    tracing::info!(purged, "Purged expired sessions");
                }
                Err(error) => tracing::error!(%error, "Session cleanup failed"),
            }
        }
    });

    tracing::info!(interval_secs, "Session cleanup task spawned");
    handle
}
