//! Microblog - a small social-blogging service
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Registration, login/logout, password reset               │
//! │  - Timelines, profiles, follows                             │
//! │  - Metrics                                                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Credential store, social graph, timelines                │
//! │  - Session and reset-token authentication                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx)                                            │
//! │  - Outgoing mail                                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Business logic layer
//! - `auth`: Sessions, passwords, reset tokens, redirects
//! - `data`: Database layer
//! - `mail`: Outgoing mail transports
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod mail;
pub mod metrics;
pub mod service;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// This struct is cloned for each request and contains
/// shared resources like the database pool and the mailer.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Outgoing mail transport
    pub mailer: Arc<dyn mail::Mailer>,

    /// Password reset token issuer/verifier
    pub reset_tokens: auth::ResetTokenService,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Build the configured mail transport
    /// 2. Connect to SQLite database
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        let mailer = mail::build_mailer(&config.mail)?;
        Self::with_mailer(config, mailer).await
    }

    /// Initialize application state with an explicit mail transport
    pub async fn with_mailer(
        config: config::AppConfig,
        mailer: Arc<dyn mail::Mailer>,
    ) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = data::Database::connect(&config.database.path).await?;
        metrics::USERS_TOTAL.set(db.count_users().await?);
        tracing::info!(transport = mailer.transport(), "Database connected");

        let reset_tokens = auth::ResetTokenService::new(&config.auth);

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db: Arc::new(db),
            mailer,
            reset_tokens,
        })
    }

    pub fn sessions(&self) -> auth::SessionService {
        auth::SessionService::new(self.db.clone(), self.config.auth.clone())
    }

    pub fn accounts(&self) -> service::AccountService {
        service::AccountService::new(self.db.clone())
    }

    pub fn graph(&self) -> service::GraphService {
        service::GraphService::new(self.db.clone())
    }

    pub fn timelines(&self) -> service::TimelineService {
        service::TimelineService::new(self.db.clone(), self.config.timeline.clone())
    }

    pub fn password_resets(&self) -> service::PasswordResetService {
        service::PasswordResetService::new(
            self.db.clone(),
            self.reset_tokens.clone(),
            self.mailer.clone(),
            self.config.clone(),
        )
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{Router, middleware};
    use tower::ServiceBuilder;
    use tower_http::trace::TraceLayer;

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::auth_router())
        .merge(api::app_router(state.clone()))
        .route_layer(middleware::from_fn(api::track_metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer),
        )
        .with_state(state)
        .merge(api::metrics_router())
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

async fn health_check() -> &'static str {
    "OK"
}
