//! Wingbox - Discord login for a small web service
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    HTTP Layer (Axum)                         │
//! │  - Middleware chains wrapping each route                    │
//! │  - /discord, /redirect, /me, /logout, /health, /metrics     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Auth Layer                              │
//! │  - OAuth state cookie                                       │
//! │  - Discord token/profile client                             │
//! │  - Signed access/refresh cookies                            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx)                                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `auth`: Discord OAuth flow and session cookies
//! - `chain`: Composable middleware chains
//! - `config`: Configuration management
//! - `data`: Users table
//! - `error`: Error types
//! - `metrics`: Prometheus metrics

pub mod auth;
pub mod chain;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Cloned for each request; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Discord API client
    pub provider: Arc<auth::ProviderClient>,

    /// Session cookie signer
    pub sessions: Arc<auth::SessionIssuer>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database
    /// 2. Build the Discord client
    /// 3. Derive the session signing key
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = data::Database::connect(&config.database.path).await?;
        tracing::info!("Database connected");

        let provider = auth::ProviderClient::new(&config.discord)?;
        let sessions = auth::SessionIssuer::new(&config.session)?;

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db: Arc::new(db),
            provider: Arc::new(provider),
            sessions: Arc::new(sessions),
        })
    }
}

/// Middleware shared by every application route
pub fn base_chain() -> chain::Chain {
    chain::Chain::new().with(chain::log_request())
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{
        Router,
        routing::{MethodRouter, get},
    };
    use tower_http::trace::TraceLayer;

    let base = base_chain();
    let health: MethodRouter = get(health_check);

    Router::new()
        .route_service("/health", base.then(health))
        .merge(auth::auth_router(&state, &base))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .route("/metrics", get(metrics::render))
}

async fn health_check() -> &'static str {
    "OK"
}
