use anyhow::Result;

use crate::auth::UserRole;

// ============================================================================
// Configuration Constants
// ============================================================================

const DEFAULT_PORT: u16 = 8080;

// Default token lifetimes (seconds). Access tokens are short-lived, refresh
// tokens live for days and are rotated on every use.
const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 900;
const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 7 * 86_400;

// Rate limiting defaults (requests per 1-second window).
const DEFAULT_BURST_CAPACITY: u32 = 20;

// Upper bound for any single call to the shared Redis store. On timeout the
// caller applies its fail-open/fail-closed policy instead of blocking the
// request.
const DEFAULT_STORE_TIMEOUT_MS: u64 = 500;

const DEFAULT_SERVICE_TIMEOUT_SECS: u64 = 10;

const DEFAULT_MAX_FAILED_LOGIN_ATTEMPTS: i32 = 5;

// Logout is public at the gateway: it authenticates the tokens carried in
// its body, and that must work even when the access token has expired.
const DEFAULT_PUBLIC_ROUTES: &[&str] = &[
    "/api/v1/auth/login",
    "/api/v1/auth/register",
    "/api/v1/auth/refresh",
    "/api/v1/auth/logout",
    "/health/**",
];

pub const MIN_JWT_SECRET_LEN: usize = 32;

// ============================================================================
// Configuration Structures
// ============================================================================

/// JWT signing and bearer-extraction settings.
#[derive(Clone, Debug)]
pub struct JwtConfig {
    /// Symmetric HS256 secret shared between the authority and the gateway.
    pub secret: String,
    pub issuer: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    /// Header carrying the bearer token (normally "authorization").
    pub header: String,
    /// Token prefix inside the header (normally "Bearer ").
    pub prefix: String,
}

/// Per-path request budgets for the 1-second fixed window.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Default budget for paths without an override.
    pub burst_capacity: u32,
    /// Ordered (path prefix, limit) overrides; first match wins.
    pub overrides: Vec<(String, u32)>,
}

impl RateLimitConfig {
    /// Resolve the per-window limit for a request path.
    pub fn limit_for_path(&self, path: &str) -> u32 {
        for (prefix, limit) in &self.overrides {
            if path.starts_with(prefix.as_str()) {
                return *limit;
            }
        }
        self.burst_capacity
    }
}

/// Route classification lists consumed by the route policy.
///
/// Patterns are glob-style: `*` matches one path segment, a trailing `**`
/// matches any suffix. Order matters for role routes: the first matching
/// pattern decides which role a path is restricted to.
#[derive(Clone, Debug)]
pub struct RoutesConfig {
    pub public_routes: Vec<String>,
    pub role_routes: Vec<(UserRole, Vec<String>)>,
}

/// Account-protection policies enforced by the credential authority.
#[derive(Clone, Debug)]
pub struct SecurityConfig {
    pub max_failed_login_attempts: i32,
    pub store_timeout_ms: u64,
}

/// Downstream service locations used by the gateway for forwarding.
#[derive(Clone, Debug)]
pub struct ServicesConfig {
    pub auth_service_url: String,
    pub user_service_url: String,
    pub alert_service_url: String,
    pub service_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub port: u16,
    pub rust_log: String,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub routes: RoutesConfig,
    pub security: SecurityConfig,
    pub services: ServicesConfig,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_list(name: &str, default: &[&str]) -> Vec<String> {
    match std::env::var(name) {
        Ok(v) => v
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")?,
            redis_url: std::env::var("REDIS_URL")?,
            port: env_parse("PORT", DEFAULT_PORT),
            rust_log: env_or("RUST_LOG", "info"),
            jwt: JwtConfig {
                secret: {
                    let secret = std::env::var("JWT_SECRET")?;
                    if secret.len() < MIN_JWT_SECRET_LEN {
                        anyhow::bail!(
                            "JWT_SECRET must be at least {} characters long. \
                             Generate one with: openssl rand -base64 32",
                            MIN_JWT_SECRET_LEN
                        );
                    }
                    secret
                },
                issuer: env_or("JWT_ISSUER", "codistrib-auth"),
                access_token_ttl_secs: env_parse(
                    "ACCESS_TOKEN_TTL_SECS",
                    DEFAULT_ACCESS_TOKEN_TTL_SECS,
                ),
                refresh_token_ttl_secs: env_parse(
                    "REFRESH_TOKEN_TTL_SECS",
                    DEFAULT_REFRESH_TOKEN_TTL_SECS,
                ),
                header: env_or("JWT_HEADER", "authorization"),
                prefix: env_or("JWT_PREFIX", "Bearer "),
            },
            rate_limit: RateLimitConfig {
                enabled: env_parse("RATE_LIMIT_ENABLED", true),
                burst_capacity: env_parse("RATE_LIMIT_BURST_CAPACITY", DEFAULT_BURST_CAPACITY),
                overrides: parse_rate_limit_overrides(&env_or(
                    "RATE_LIMIT_OVERRIDES",
                    "/api/v1/auth/login=5,/api/v1/auth/register=2",
                )),
            },
            routes: RoutesConfig {
                public_routes: env_list("PUBLIC_ROUTES", DEFAULT_PUBLIC_ROUTES),
                role_routes: vec![
                    (
                        UserRole::Administrator,
                        env_list("ADMIN_ROUTES", &["/api/v1/admin/**"]),
                    ),
                    (
                        UserRole::Helper,
                        env_list("HELPER_ROUTES", &["/api/v1/helpers/**"]),
                    ),
                    (
                        UserRole::PersonDi,
                        env_list("PERSON_DI_ROUTES", &["/api/v1/persons/**"]),
                    ),
                ],
            },
            security: SecurityConfig {
                max_failed_login_attempts: env_parse(
                    "MAX_FAILED_LOGIN_ATTEMPTS",
                    DEFAULT_MAX_FAILED_LOGIN_ATTEMPTS,
                ),
                store_timeout_ms: env_parse("STORE_TIMEOUT_MS", DEFAULT_STORE_TIMEOUT_MS),
            },
            services: ServicesConfig {
                auth_service_url: env_or("AUTH_SERVICE_URL", "http://localhost:8081"),
                user_service_url: env_or("USER_SERVICE_URL", "http://localhost:8082"),
                alert_service_url: env_or("ALERT_SERVICE_URL", "http://localhost:8083"),
                service_timeout_secs: env_parse(
                    "SERVICE_TIMEOUT_SECS",
                    DEFAULT_SERVICE_TIMEOUT_SECS,
                ),
            },
        })
    }
}

/// Parse "path=limit,path=limit" into an ordered override table.
/// Malformed entries are skipped with a warning rather than failing startup.
fn parse_rate_limit_overrides(raw: &str) -> Vec<(String, u32)> {
    let mut overrides = Vec::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match entry.split_once('=') {
            Some((path, limit)) => match limit.trim().parse::<u32>() {
                Ok(limit) if !path.trim().is_empty() => {
                    overrides.push((path.trim().to_string(), limit));
                }
                _ => tracing::warn!(entry = %entry, "Skipping malformed rate limit override"),
            },
            None => tracing::warn!(entry = %entry, "Skipping malformed rate limit override"),
        }
    }
    overrides
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(overrides: &str, burst: u32) -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            burst_capacity: burst,
            overrides: parse_rate_limit_overrides(overrides),
        }
    }

    #[test]
    fn limit_resolution_prefers_overrides() {
        let cfg = limits("/api/v1/auth/login=5,/api/v1/auth/register=2", 20);
        assert_eq!(cfg.limit_for_path("/api/v1/auth/login"), 5);
        assert_eq!(cfg.limit_for_path("/api/v1/auth/register"), 2);
        assert_eq!(cfg.limit_for_path("/api/v1/users/42"), 20);
    }

    #[test]
    fn first_matching_override_wins() {
        let cfg = limits("/api/v1/auth=3,/api/v1/auth/login=5", 20);
        assert_eq!(cfg.limit_for_path("/api/v1/auth/login"), 3);
    }

    #[test]
    fn malformed_overrides_are_skipped() {
        let cfg = limits("nonsense,/a/b=notanumber,/ok=7", 20);
        assert_eq!(cfg.overrides, vec![("/ok".to_string(), 7)]);
    }

    #[test]
    fn logout_is_public_by_default() {
        // Logout must stay reachable with an expired access token, so the
        // gateway cannot gate it on the Authorization header.
        assert!(DEFAULT_PUBLIC_ROUTES.contains(&"/api/v1/auth/logout"));
        assert!(!DEFAULT_PUBLIC_ROUTES.contains(&"/api/v1/auth/validate"));
    }
}
