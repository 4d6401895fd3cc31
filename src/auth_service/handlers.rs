// ============================================================================
// Authentication Routes
// ============================================================================
//
// Endpoints:
// - POST /api/v1/auth/register - Create an account and sign in
// - POST /api/v1/auth/login    - Authenticate with username/email + password
// - POST /api/v1/auth/refresh  - Rotate a refresh token
// - POST /api/v1/auth/logout   - Revoke access + refresh tokens
// - POST /api/v1/auth/validate - Inspect an access token
// - GET  /health, /health/ready, /health/live
//
// ============================================================================

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::error::AppError;

use super::models::{
    LoginRequest, LogoutRequest, RefreshRequest, RegisterRequest, ValidateRequest,
};
use super::SharedAuthState;

pub fn router(state: SharedAuthState) -> Router {
    Router::new()
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/refresh", post(refresh))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/auth/validate", post(validate))
        .route("/health", get(health))
        .route("/health/live", get(health))
        .route("/health/ready", get(ready))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn register(
    State(state): State<SharedAuthState>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let pair = state.core.register(request).await?;
    Ok((StatusCode::CREATED, Json(pair)))
}

async fn login(
    State(state): State<SharedAuthState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let pair = state.core.login(request).await?;
    Ok(Json(pair))
}

async fn refresh(
    State(state): State<SharedAuthState>,
    Json(request): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let pair = state.core.refresh(&request.refresh_token).await?;
    Ok(Json(pair))
}

async fn logout(
    State(state): State<SharedAuthState>,
    Json(request): Json<LogoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .core
        .logout(&request.access_token, &request.refresh_token)
        .await?;
    Ok(Json(json!({ "success": true })))
}

async fn validate(
    State(state): State<SharedAuthState>,
    Json(request): Json<ValidateRequest>,
) -> impl IntoResponse {
    Json(state.core.validate(&request.access_token).await)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Readiness probes the backing stores; liveness does not.
async fn ready(State(state): State<SharedAuthState>) -> Result<impl IntoResponse, AppError> {
    sqlx::query("SELECT 1").execute(&state.db).await?;
    state.redis.ping().await?;
    Ok(Json(json!({ "status": "ready" })))
}
