/// Rate Limiting Module
///
/// Implements a per-client fixed 1-second window backed by Redis counters.
/// The limiter fails open: when Redis is unreachable or slow, requests pass
/// so a cache outage never becomes a full request outage.
use crate::config::RateLimitConfig;
use crate::redis::RedisClient;

const WINDOW_SECS: i64 = 1;

/// Outcome of one admission check. The gateway turns this into
/// X-RateLimit-* headers and, when not permitted, a 429 rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub permitted: bool,
    pub limit: u32,
    pub remaining: u32,
    pub current: u32,
}

impl RateLimitDecision {
    fn permit(limit: u32, current: u32) -> Self {
        Self {
            permitted: true,
            limit,
            remaining: limit.saturating_sub(current),
            current,
        }
    }

    fn reject(limit: u32, current: u32) -> Self {
        Self {
            permitted: false,
            limit,
            remaining: 0,
            current,
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    redis: RedisClient,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(redis: RedisClient, config: RateLimitConfig) -> Self {
        Self { redis, config }
    }

    /// Admit or reject one request from `client` hitting `path`.
    ///
    /// Counter keys are per client; the limit is resolved per path, so one
    /// client hammering /auth/login exhausts that budget without touching
    /// its budget for other paths sharing the same counter window.
    pub async fn check(&self, client: &str, path: &str) -> RateLimitDecision {
        let limit = self.config.limit_for_path(path);

        if !self.config.enabled {
            return RateLimitDecision::permit(limit, 0);
        }

        let key = format!("rate_limit:{}", client);

        let count = match self.redis.incr(&key).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    client = %client,
                    "Rate limit check failed, allowing request"
                );
                return RateLimitDecision::permit(limit, 0);
            }
        };

        // Fresh window: attach the 1-second expiry. If this EXPIRE fails the
        // key would never reset, so treat the failure like any other store
        // error and fail open.
        if count == 1 {
            if let Err(e) = self.redis.expire(&key, WINDOW_SECS).await {
                tracing::warn!(
                    error = %e,
                    client = %client,
                    "Failed to set rate limit window expiry, allowing request"
                );
                return RateLimitDecision::permit(limit, 1);
            }
        }

        let current = u32::try_from(count).unwrap_or(u32::MAX);

        if current > limit {
            tracing::debug!(
                client = %client,
                path = %path,
                current = current,
                limit = limit,
                "Rate limit exceeded"
            );
            RateLimitDecision::reject(limit, current)
        } else {
            RateLimitDecision::permit(limit, current)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;

    fn limiter_config(enabled: bool) -> RateLimitConfig {
        RateLimitConfig {
            enabled,
            burst_capacity: 20,
            overrides: vec![
                ("/api/v1/auth/login".to_string(), 5),
                ("/api/v1/auth/register".to_string(), 2),
            ],
        }
    }

    #[test]
    fn decision_headers_reflect_budget() {
        let d = RateLimitDecision::permit(5, 3);
        assert!(d.permitted);
        assert_eq!(d.remaining, 2);

        let d = RateLimitDecision::permit(5, 5);
        assert_eq!(d.remaining, 0);

        let d = RateLimitDecision::reject(5, 6);
        assert!(!d.permitted);
        assert_eq!(d.remaining, 0);
        assert_eq!(d.current, 6);
    }

    // The tests below need a running Redis (REDIS_URL). They exercise the
    // counter semantics end to end.

    async fn test_limiter(enabled: bool) -> RateLimiter {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let redis = RedisClient::connect(&url, 500).await.unwrap();
        RateLimiter::new(redis, limiter_config(enabled))
    }

    #[tokio::test]
    #[ignore]
    async fn over_budget_requests_are_rejected() {
        let limiter = test_limiter(true).await;
        let client = format!("test-{}", uuid::Uuid::new_v4());

        for i in 1..=5 {
            let d = limiter.check(&client, "/api/v1/auth/login").await;
            assert!(d.permitted, "request {} should pass", i);
            assert_eq!(d.current, i);
        }
        let d = limiter.check(&client, "/api/v1/auth/login").await;
        assert!(!d.permitted);
        assert_eq!(d.limit, 5);
    }

    #[tokio::test]
    #[ignore]
    async fn window_resets_after_one_second() {
        let limiter = test_limiter(true).await;
        let client = format!("test-{}", uuid::Uuid::new_v4());

        for _ in 0..3 {
            limiter.check(&client, "/api/v1/auth/register").await;
        }
        assert!(!limiter.check(&client, "/api/v1/auth/register").await.permitted);

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

        let d = limiter.check(&client, "/api/v1/auth/register").await;
        assert!(d.permitted);
        assert_eq!(d.current, 1);
    }

    #[tokio::test]
    #[ignore]
    async fn disabled_limiter_always_permits() {
        let limiter = test_limiter(false).await;
        let client = format!("test-{}", uuid::Uuid::new_v4());

        for _ in 0..50 {
            assert!(limiter.check(&client, "/api/v1/auth/login").await.permitted);
        }
    }
}
