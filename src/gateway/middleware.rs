// ============================================================================
// Gateway Middleware
// ============================================================================
//
// Two stages, in order:
// - rate_limiting: per-client fixed window, runs before authentication so
//   floods are cut off without paying for token verification
// - jwt_auth: bearer token verification, revocation check, role
//   authorization, trusted header injection
//
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::auth::TokenError;
use crate::rate_limit::RateLimitDecision;
use crate::utils::extract_client_ip;

use super::GatewayState;

// Header names for identity propagation (Trust Boundary pattern)
const HEADER_USER_ID: &str = "x-user-id";
const HEADER_USER_ROLE: &str = "x-user-role";
const HEADER_USER_EMAIL: &str = "x-user-email";
const HEADER_REQUEST_ID: &str = "x-request-id";

/// Structured rejection body emitted by the gateway itself (as opposed to
/// errors proxied back from downstream services).
pub fn rejection(status: StatusCode, error: &str, message: &str, path: &str) -> Response {
    let body = json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "status": status.as_u16(),
        "error": error,
        "message": message,
        "path": path,
    });
    (status, Json(body)).into_response()
}

fn rate_limit_rejection(decision: &RateLimitDecision, path: &str) -> Response {
    let status = StatusCode::TOO_MANY_REQUESTS;
    let body = json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "status": status.as_u16(),
        "error": "RATE_LIMIT_EXCEEDED",
        "message": "Too many requests",
        "path": path,
        "limit": decision.limit,
        "current": decision.current,
    });
    let mut response = (status, Json(body)).into_response();
    let headers = response.headers_mut();
    headers.insert("retry-after", HeaderValue::from_static("1"));
    if let Ok(v) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert("x-ratelimit-limit", v);
    }
    headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
    response
}

/// Rate limiting middleware
///
/// Admission is keyed by client IP. Permitted requests carry the remaining
/// budget back to the client in X-RateLimit-* response headers.
pub async fn rate_limiting(
    State(state): State<Arc<GatewayState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let client_ip = extract_client_ip(request.headers(), Some(addr.ip()));

    let decision = state.limiter.check(&client_ip, &path).await;

    if !decision.permitted {
        tracing::warn!(
            ip = %client_ip,
            path = %path,
            current = decision.current,
            limit = decision.limit,
            "Rate limit exceeded"
        );
        return rate_limit_rejection(&decision, &path);
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert("x-ratelimit-limit", v);
    }
    if let Ok(v) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("x-ratelimit-remaining", v);
    }
    response
}

/// JWT authentication and authorization middleware
///
/// After successful verification, adds trusted headers for downstream
/// services:
/// - X-User-Id, X-User-Role, X-User-Email: identity from JWT claims
/// - X-Request-Id: unique request trace ID
///
/// This implements the Trust Boundary pattern where the gateway is the
/// single point of authentication and services trust the propagated
/// headers. Inbound X-User-* headers are always stripped first so clients
/// can never smuggle an identity past the boundary.
pub async fn jwt_auth(
    State(state): State<Arc<GatewayState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    // Strip identity headers from the untrusted side, unconditionally.
    for header in [HEADER_USER_ID, HEADER_USER_ROLE, HEADER_USER_EMAIL] {
        request.headers_mut().remove(header);
    }

    // Generate request ID for tracing (always, even for public endpoints)
    let request_id = Uuid::new_v4().to_string();
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        request
            .headers_mut()
            .insert(HeaderName::from_static(HEADER_REQUEST_ID), value);
    }

    // Public endpoints skip authentication entirely
    if state.policy.is_public(&path) {
        return next.run(request).await;
    }

    // Extract bearer token from the configured header
    let token = match request
        .headers()
        .get(state.config.jwt.header.as_str())
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix(state.config.jwt.prefix.as_str()))
    {
        Some(token) => token.to_string(),
        None => {
            tracing::debug!(path = %path, "Missing or malformed Authorization header");
            return rejection(
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Missing or invalid authorization header",
                &path,
            );
        }
    };

    // Verify the token
    let claims = match state.auth_manager.verify_token(&token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!(error = %e, path = %path, "JWT verification failed");
            let message = match e {
                TokenError::Expired => "Token expired",
                _ => "Invalid token",
            };
            return rejection(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message, &path);
        }
    };

    // Check for revocation (soft logout)
    if state.blacklist.is_revoked(&claims.jti).await {
        tracing::warn!(path = %path, jti = %claims.jti, "Token was revoked");
        return rejection(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "Token revoked",
            &path,
        );
    }

    // Role authorization
    if !state.policy.authorize(&path, claims.role) {
        let allowed = state
            .policy
            .allowed_roles(&path)
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        tracing::warn!(
            path = %path,
            role = %claims.role,
            allowed = %allowed,
            user_id = %claims.sub,
            "Role not permitted for path"
        );
        return rejection(
            StatusCode::FORBIDDEN,
            "FORBIDDEN",
            &format!("Requires role: {}", allowed),
            &path,
        );
    }

    // =========================================================================
    // Trust Boundary: add trusted headers for downstream services
    // =========================================================================
    let headers = request.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&claims.sub) {
        headers.insert(HeaderName::from_static(HEADER_USER_ID), value);
    }
    if let Ok(value) = HeaderValue::from_str(claims.role.as_str()) {
        headers.insert(HeaderName::from_static(HEADER_USER_ROLE), value);
    }
    if let Ok(value) = HeaderValue::from_str(&claims.email) {
        headers.insert(HeaderName::from_static(HEADER_USER_EMAIL), value);
    }

    tracing::debug!(
        user_id = %claims.sub,
        request_id = %request_id,
        path = %path,
        "JWT verified, trusted headers added"
    );

    next.run(request).await
}
