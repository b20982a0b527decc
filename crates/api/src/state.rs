use common::clock::Clock;
use common::config::Settings;
use std::sync::Arc;
use store::{FailureLog, KvStore, RateLimiter};

use crate::middleware::auth::hash_token;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn KvStore>,
    pub clock: Arc<dyn Clock>,
    pub limiter: Arc<RateLimiter>,
    pub failure_log: Arc<FailureLog>,
    /// SHA-256 of the admin bearer token. `None` locks the admin routes.
    pub admin_token_hash: Option<Vec<u8>>,
    /// Clock reading when the state was built, for reporting uptime.
    pub started_at_ms: i64,
}

impl AppState {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, settings: &Settings) -> Self {
        let limiter = Arc::new(RateLimiter::new(
            store.clone(),
            clock.clone(),
            settings.rate_limits.clone(),
            settings.rate_limit_policy,
        ));
        let failure_log = Arc::new(FailureLog::new(
            store.clone(),
            settings.failure_log_max,
            settings.failure_log_default_limit,
        ));
        let started_at_ms = clock.now_ms();
        Self {
            store,
            clock,
            limiter,
            failure_log,
            admin_token_hash: settings.admin_token.as_deref().map(hash_token),
            started_at_ms,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestId(pub String);
