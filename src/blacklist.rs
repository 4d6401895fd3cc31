//! Access token revocation store
//!
//! Revoked access tokens are tracked by jti in Redis with a TTL equal to the
//! token's remaining lifetime. After expiry the entry is useless anyway, so
//! the store self-cleans.

use chrono::Utc;

use crate::error::AppResult;
use crate::redis::RedisClient;

const BLACKLIST_PREFIX: &str = "auth:blacklist:";

#[derive(Clone)]
pub struct RevocationStore {
    redis: RedisClient,
}

impl RevocationStore {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }

    /// Revoke a token until its natural expiry.
    ///
    /// A token already at or past expiry needs no entry; revoking it is a
    /// no-op rather than an error.
    pub async fn revoke(&self, jti: &str, exp: i64) -> AppResult<()> {
        let ttl = exp - Utc::now().timestamp();
        if ttl <= 0 {
            tracing::debug!(jti = %jti, "Skipping revocation of already expired token");
            return Ok(());
        }

        self.redis
            .set_ex(&format!("{}{}", BLACKLIST_PREFIX, jti), "1", ttl as u64)
            .await?;

        tracing::info!(jti = %jti, ttl_secs = ttl, "Access token revoked");
        Ok(())
    }

    /// Check whether a token has been revoked.
    ///
    /// Fails open: on a store error the token is treated as not revoked, so
    /// a Redis outage degrades revocation rather than locking everyone out.
    pub async fn is_revoked(&self, jti: &str) -> bool {
        match self
            .redis
            .exists(&format!("{}{}", BLACKLIST_PREFIX, jti))
            .await
        {
            Ok(revoked) => revoked,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    jti = %jti,
                    "Revocation check failed, treating token as valid"
                );
                false
            }
        }
    }
}
