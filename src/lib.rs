//! Gatehouse - social sign-in gateway
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - /auth/{google,twitter,github}[/callback], /auth/logout   │
//! │  - /, /getuser, /login, /metrics                            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Auth & Service Layer                       │
//! │  - Provider handshakes and profile normalization            │
//! │  - Identity resolution (find-or-create)                     │
//! │  - Server-side sessions                                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx): identities, sessions                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: greeting, current user and metrics handlers
//! - `auth`: provider flows, sessions and extractors
//! - `service`: identity resolution
//! - `data`: database layer
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod service;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Every collaborator a handler needs is reachable from here; nothing is
/// looked up from process-wide state except the metrics registry.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Find-or-create of identity records
    pub resolver: Arc<service::IdentityResolver>,

    /// Session issue/restore/logout
    pub sessions: Arc<auth::SessionManager>,

    /// Enabled identity providers
    pub providers: Arc<auth::ProviderRegistry>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database
    /// 2. Build the outbound HTTP client
    /// 3. Enable the configured providers
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Connect to SQLite database
        let db = data::Database::connect(&config.database.path).await?;
        tracing::info!("Database connected");

        // 2. Initialize HTTP client
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("Gatehouse/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| error::AppError::Internal(e.into()))?;

        // 3. Providers
        let providers = auth::ProviderRegistry::from_config(&config.providers, &http_client);
        tracing::info!(
            providers = ?providers.configured(),
            "Identity providers initialized"
        );

        tracing::info!("Application state initialized successfully");

        Ok(Self::from_parts(config, Arc::new(db), providers))
    }

    /// Assemble state from already-built collaborators
    pub fn from_parts(
        config: config::AppConfig,
        db: Arc<data::Database>,
        providers: auth::ProviderRegistry,
    ) -> Self {
        let resolver = service::IdentityResolver::new(db.clone());
        let sessions = auth::SessionManager::new(
            db.clone(),
            config.auth.session_secret.clone(),
            chrono::Duration::seconds(config.auth.session_max_age),
        );

        Self {
            config: Arc::new(config),
            db,
            resolver: Arc::new(resolver),
            sessions: Arc::new(sessions),
            providers: Arc::new(providers),
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    let cors_layer = build_cors_layer(&state.config.auth);

    Router::new()
        .merge(api::user_router())
        .merge(auth::auth_router())
        .merge(api::metrics_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Allow the configured client origin, with credentials
fn build_cors_layer(auth: &config::AuthConfig) -> tower_http::cors::CorsLayer {
    use axum::http::{HeaderValue, Method, header};
    use tower_http::cors::CorsLayer;

    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    match HeaderValue::from_str(&auth.client_origin) {
        Ok(origin) => base.allow_origin([origin]),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %auth.client_origin,
                "Failed to parse CORS origin; denying cross-origin requests"
            );
            base
        }
    }
}
