// ============================================================================
// API Gateway Service
// ============================================================================
//
// Single entry point for all client requests. It handles:
// - Rate limiting (per-client fixed window)
// - JWT authentication verification and revocation checks
// - Role-based route authorization
// - Trusted identity header propagation
// - Request routing to downstream services
//
// Stateless apart from Redis-backed counters, so it scales horizontally.
//
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use codistrib_server::config::Config;
use codistrib_server::gateway::router::build_router;
use codistrib_server::gateway::GatewayState;
use codistrib_server::redis::RedisClient;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    let config = Arc::new(config);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.rust_log.clone()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("=== API Gateway Starting ===");
    info!("Port: {}", config.port);
    info!("Rate limiting enabled: {}", config.rate_limit.enabled);

    let redis = RedisClient::connect(&config.redis_url, config.security.store_timeout_ms)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to Redis: {}", e))?;

    let state = GatewayState::new(config.clone(), redis);
    let app = build_router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port)
        .parse()
        .context("Failed to parse bind address")?;

    info!("API Gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Failed to start server")?;

    Ok(())
}
