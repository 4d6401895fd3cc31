//! Redis client with connection management and bounded call latency

use std::time::Duration;

use redis::{aio::ConnectionManager, AsyncCommands};

use crate::error::{AppError, AppResult};

/// Redis client with automatic reconnection.
///
/// Every call is bounded by a timeout so a slow or partitioned Redis never
/// stalls the request path. Callers decide fail-open vs fail-closed.
#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
    timeout: Duration,
}

impl RedisClient {
    /// Connect to Redis server.
    ///
    /// Supports both redis:// and rediss:// (TLS) URLs.
    pub async fn connect(url: &str, timeout_ms: u64) -> AppResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            timeout: Duration::from_millis(timeout_ms),
        })
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> AppResult<T>
    where
        F: std::future::Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(AppError::Unavailable(format!(
                "Redis {} timed out after {}ms",
                op,
                self.timeout.as_millis()
            ))),
        }
    }

    /// SET with expiry in seconds
    pub async fn set_ex(&self, key: &str, value: &str, seconds: u64) -> AppResult<()> {
        let mut conn = self.conn.clone();
        self.bounded("SETEX", conn.set_ex(key, value, seconds)).await
    }

    /// EXISTS - check if key exists
    pub async fn exists(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        self.bounded("EXISTS", conn.exists(key)).await
    }

    /// INCR - increment integer value, returns the new count
    pub async fn incr(&self, key: &str) -> AppResult<i64> {
        let mut conn = self.conn.clone();
        self.bounded("INCR", conn.incr(key, 1)).await
    }

    /// EXPIRE - set expiry time in seconds
    pub async fn expire(&self, key: &str, seconds: i64) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        self.bounded("EXPIRE", conn.expire(key, seconds)).await
    }

    /// PING - connectivity probe for readiness checks
    pub async fn ping(&self) -> AppResult<()> {
        let mut conn = self.conn.clone();
        self.bounded("PING", async move {
            redis::cmd("PING").query_async::<()>(&mut conn).await
        })
        .await
    }
}
