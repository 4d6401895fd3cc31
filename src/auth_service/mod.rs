//! Credential authority: registration, login, token refresh, logout and
//! token validation.

pub mod core;
pub mod handlers;
pub mod models;
pub mod repo;

use std::sync::Arc;

use crate::auth::AuthManager;
use crate::blacklist::RevocationStore;
use crate::config::Config;
use crate::db::DbPool;
use crate::redis::RedisClient;

/// Shared state for the auth-service binary.
pub struct AuthServiceState {
    pub core: core::AuthDomainService,
    pub redis: RedisClient,
    pub db: DbPool,
}

impl AuthServiceState {
    pub fn new(config: &Config, db: DbPool, redis: RedisClient) -> Self {
        let auth_manager = AuthManager::new(&config.jwt);
        let blacklist = RevocationStore::new(redis.clone());
        let core = core::AuthDomainService::new(
            db.clone(),
            auth_manager,
            blacklist,
            config.jwt.refresh_token_ttl_secs,
            config.security.max_failed_login_attempts,
        );
        Self { core, redis, db }
    }
}

pub type SharedAuthState = Arc<AuthServiceState>;
