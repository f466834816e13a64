//! Wingbox binary entry point

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wingbox::{AppState, config};

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging
/// 3. Initialize AppState
/// 4. Build Axum router
/// 5. Start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration
    let config = config::AppConfig::load()?;

    // 2. Initialize tracing/logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.filter_directives().into());

    if config.logging.is_json() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting Wingbox...");
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        database = %config.database.path.display(),
        "Configuration loaded"
    );

    wingbox::metrics::init_metrics();

    let addr = format!("{}:{}", config.server.host, config.server.port);

    // 3. Initialize application state
    let state = AppState::new(config).await?;

    // 4. Build Axum router
    let app = wingbox::build_router(state);

    // 5. Start HTTP server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
