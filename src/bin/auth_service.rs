// ============================================================================
// Auth Service
// ============================================================================
//
// Credential authority. Owns the user_auth and refresh_tokens tables and
// the access token revocation list. Endpoints:
// - POST /api/v1/auth/register
// - POST /api/v1/auth/login
// - POST /api/v1/auth/refresh
// - POST /api/v1/auth/logout
// - POST /api/v1/auth/validate
//
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use codistrib_server::auth_service::{handlers, AuthServiceState};
use codistrib_server::config::Config;
use codistrib_server::db;
use codistrib_server::redis::RedisClient;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.rust_log.clone()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("=== Auth Service Starting ===");
    info!("Port: {}", config.port);

    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    db::run_migrations(&pool).await?;

    let redis = RedisClient::connect(&config.redis_url, config.security.store_timeout_ms)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to Redis: {}", e))?;

    let state = Arc::new(AuthServiceState::new(&config, pool, redis));
    let app = handlers::router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port)
        .parse()
        .context("Failed to parse bind address")?;

    info!("Auth service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
