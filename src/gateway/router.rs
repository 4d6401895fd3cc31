// ============================================================================
// Gateway Router
// ============================================================================
//
// Routes requests to downstream services based on path.
//
// Routing rules:
// - /api/v1/auth/*                → auth-service
// - /api/v1/users/*               → user-service
// - /api/v1/persons/*             → user-service
// - /api/v1/helpers/*             → user-service
// - /api/v1/admin/*               → user-service
// - /api/v1/credential-requests/* → user-service
// - /api/v1/alerts/*              → alert-service
// - anything else                 → 404
//
// ============================================================================

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::middleware::{jwt_auth, rate_limiting, rejection};
use super::GatewayState;

/// Build the gateway router with the full middleware pipeline. Layers run
/// outermost first: tracing, then rate limiting, then authentication.
pub fn build_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/live", get(health))
        .route("/health/ready", get(ready))
        .route("/api/v1/*path", any(route_request))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(state.clone(), rate_limiting))
                .layer(middleware::from_fn_with_state(state.clone(), jwt_auth)),
        )
        .with_state(state)
}

/// Forward a request to the downstream service owning its path.
async fn route_request(
    State(state): State<Arc<GatewayState>>,
    request: Request<Body>,
) -> Response {
    let path = request.uri().path().to_string();

    let service_url = match downstream_for(&path) {
        Some(Downstream::Auth) => &state.config.services.auth_service_url,
        Some(Downstream::User) => &state.config.services.user_service_url,
        Some(Downstream::Alert) => &state.config.services.alert_service_url,
        None => {
            return rejection(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "No route for this path",
                &path,
            );
        }
    };

    match state
        .service_client
        .forward_request(service_url, request)
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(
                error = %e,
                service_url = %service_url,
                path = %path,
                "Failed to forward request to service"
            );
            rejection(
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_ERROR",
                "Downstream service unavailable",
                &path,
            )
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Downstream {
    Auth,
    User,
    Alert,
}

fn downstream_for(path: &str) -> Option<Downstream> {
    match path {
        p if p.starts_with("/api/v1/auth") => Some(Downstream::Auth),
        p if p.starts_with("/api/v1/users") => Some(Downstream::User),
        p if p.starts_with("/api/v1/persons") => Some(Downstream::User),
        p if p.starts_with("/api/v1/helpers") => Some(Downstream::User),
        p if p.starts_with("/api/v1/admin") => Some(Downstream::User),
        p if p.starts_with("/api/v1/credential-requests") => Some(Downstream::User),
        p if p.starts_with("/api/v1/alerts") => Some(Downstream::Alert),
        _ => None,
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Readiness probes the rate limit / revocation store.
async fn ready(State(state): State<Arc<GatewayState>>) -> Response {
    match state.redis.ping().await {
        Ok(()) => Json(json!({ "status": "ready" })).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "not ready" })),
            )
                .into_response()
        }
    }
}
