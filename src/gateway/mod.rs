//! Edge gateway: rate limiting, token verification, role authorization and
//! request forwarding.

pub mod middleware;
pub mod router;
pub mod service_client;

use std::sync::Arc;

use crate::auth::AuthManager;
use crate::blacklist::RevocationStore;
use crate::config::Config;
use crate::rate_limit::RateLimiter;
use crate::redis::RedisClient;
use crate::route_policy::RoutePolicy;

use service_client::ServiceClient;

/// Gateway router state
pub struct GatewayState {
    pub config: Arc<Config>,
    pub auth_manager: AuthManager,
    pub policy: RoutePolicy,
    pub limiter: RateLimiter,
    pub blacklist: RevocationStore,
    pub service_client: ServiceClient,
    pub redis: RedisClient,
}

impl GatewayState {
    pub fn new(config: Arc<Config>, redis: RedisClient) -> Arc<Self> {
        let auth_manager = AuthManager::new(&config.jwt);
        let policy = RoutePolicy::new(&config.routes);
        let limiter = RateLimiter::new(redis.clone(), config.rate_limit.clone());
        let blacklist = RevocationStore::new(redis.clone());
        let service_client = ServiceClient::new(config.services.service_timeout_secs);

        Arc::new(Self {
            config,
            auth_manager,
            policy,
            limiter,
            blacklist,
            service_client,
            redis,
        })
    }
}
