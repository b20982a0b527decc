//! Fixed-window call counting.
//!
//! Counters live in the key-value store under
//! `ratelimit:{limit_type}:{identity}:{bucket}` where `bucket` is the current
//! time divided by the window length. Each counter expires after twice the
//! window so old buckets clean themselves up.

use common::clock::Clock;
use common::config::{FailurePolicy, LimitRule, RateLimits};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

use crate::kv::KvStore;
use crate::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u64,
    /// Epoch milliseconds at which the current window closes.
    pub reset_at: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("rate limit exceeded for {limit_type}, retry after {reset_at}")]
    Exceeded { limit_type: String, reset_at: i64 },
}

pub struct RateLimiter {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    limits: RateLimits,
    policy: FailurePolicy,
}

pub fn bucket_key(limit_type: &str, identity: &str, bucket: i64) -> String {
    format!("ratelimit:{}:{}:{}", limit_type, identity, bucket)
}

/// Counter lifetime: twice the window, in whole seconds rounded up.
pub fn counter_ttl(rule: &LimitRule) -> Duration {
    let window_secs = (rule.window_ms.max(1) as u64).div_ceil(1000);
    Duration::from_secs(window_secs * 2)
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        limits: RateLimits,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            store,
            clock,
            limits,
            policy,
        }
    }

    fn current_bucket(&self, rule: &LimitRule) -> i64 {
        self.clock.now_ms().div_euclid(rule.window_ms.max(1))
    }

    pub async fn check(&self, identity: &str, limit_type: &str) -> RateLimitDecision {
        let rule = self.limits.rule(limit_type);
        let bucket = self.current_bucket(&rule);
        let key = bucket_key(limit_type, identity, bucket);
        let reset_at = (bucket + 1) * rule.window_ms;

        match self
            .store
            .bump_counter(&key, rule.max_requests, counter_ttl(&rule))
            .await
        {
            Ok((count, true)) => RateLimitDecision {
                allowed: true,
                remaining: rule.max_requests.saturating_sub(count + 1),
                reset_at,
            },
            Ok((count, false)) => {
                warn!(identity, limit_type, count, "rate limit exceeded");
                RateLimitDecision {
                    allowed: false,
                    remaining: 0,
                    reset_at,
                }
            }
            Err(err) => self.degraded(identity, limit_type, &rule, err),
        }
    }

    fn degraded(
        &self,
        identity: &str,
        limit_type: &str,
        rule: &LimitRule,
        err: StoreError,
    ) -> RateLimitDecision {
        let reset_at = self.clock.now_ms() + rule.window_ms;
        match self.policy {
            FailurePolicy::Open => {
                error!(identity, limit_type, error = %err, "rate limit check failed, allowing");
                RateLimitDecision {
                    allowed: true,
                    remaining: rule.max_requests,
                    reset_at,
                }
            }
            FailurePolicy::Closed => {
                error!(identity, limit_type, error = %err, "rate limit check failed, denying");
                RateLimitDecision {
                    allowed: false,
                    remaining: 0,
                    reset_at,
                }
            }
        }
    }

    pub async fn check_or_throw(
        &self,
        identity: &str,
        limit_type: &str,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let decision = self.check(identity, limit_type).await;
        if !decision.allowed {
            return Err(RateLimitError::Exceeded {
                limit_type: limit_type.to_string(),
                reset_at: decision.reset_at,
            });
        }
        Ok(decision)
    }

    /// Drops the counter for the current window only.
    pub async fn reset(&self, identity: &str, limit_type: &str) -> Result<(), StoreError> {
        let rule = self.limits.rule(limit_type);
        let key = bucket_key(limit_type, identity, self.current_bucket(&rule));
        self.store.delete(&key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryKv;
    use async_trait::async_trait;
    use common::clock::ManualClock;

    struct DownKv;

    #[async_trait]
    impl KvStore for DownKv {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn put(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    const START: i64 = 1_700_000_000_000;

    fn limiter(max: u64) -> (Arc<ManualClock>, Arc<MemoryKv>, RateLimiter) {
        let clock = Arc::new(ManualClock::new(START));
        let kv = Arc::new(MemoryKv::new(clock.clone()));
        let limits = RateLimits::empty().with_rule("notify", LimitRule::new(max, 60_000));
        let limiter = RateLimiter::new(kv.clone(), clock.clone(), limits, FailurePolicy::Open);
        (clock, kv, limiter)
    }

    #[tokio::test]
    async fn test_allows_exactly_max_requests_per_window() {
        let (_clock, _kv, limiter) = limiter(5);
        let mut remaining = Vec::new();
        for _ in 0..5 {
            let decision = limiter.check("1.2.3.4", "notify").await;
            assert!(decision.allowed);
            remaining.push(decision.remaining);
        }
        assert_eq!(remaining, vec![4, 3, 2, 1, 0]);

        let denied = limiter.check("1.2.3.4", "notify").await;
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
    }

    #[tokio::test]
    async fn test_reset_at_is_window_end() {
        let (_clock, _kv, limiter) = limiter(5);
        let decision = limiter.check("ip", "notify").await;
        let bucket = START / 60_000;
        assert_eq!(decision.reset_at, (bucket + 1) * 60_000);
    }

    #[tokio::test]
    async fn test_denied_check_does_not_increment() {
        let (_clock, kv, limiter) = limiter(1);
        limiter.check("ip", "notify").await;
        limiter.check("ip", "notify").await;
        limiter.check("ip", "notify").await;
        let key = bucket_key("notify", "ip", START / 60_000);
        assert_eq!(kv.get(&key).await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_counter_key_and_ttl() {
        let (_clock, kv, limiter) = limiter(5);
        limiter.check("ip", "notify").await;
        let key = format!("ratelimit:notify:ip:{}", START / 60_000);
        assert_eq!(kv.get(&key).await.unwrap().as_deref(), Some("1"));
        assert_eq!(kv.ttl(&key), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_counter_ttl_rounds_window_up() {
        assert_eq!(counter_ttl(&LimitRule::new(1, 60_000)), Duration::from_secs(120));
        assert_eq!(counter_ttl(&LimitRule::new(1, 1_500)), Duration::from_secs(4));
        assert_eq!(counter_ttl(&LimitRule::new(1, 1)), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_new_window_starts_fresh() {
        let (clock, _kv, limiter) = limiter(1);
        assert!(limiter.check("ip", "notify").await.allowed);
        assert!(!limiter.check("ip", "notify").await.allowed);
        clock.advance(60_000);
        assert!(limiter.check("ip", "notify").await.allowed);
    }

    #[tokio::test]
    async fn test_identities_and_types_are_independent() {
        let (_clock, _kv, limiter) = limiter(1);
        assert!(limiter.check("a", "notify").await.allowed);
        assert!(limiter.check("b", "notify").await.allowed);
        assert!(limiter.check("a", "login").await.allowed);
        assert!(!limiter.check("a", "notify").await.allowed);
    }

    #[tokio::test]
    async fn test_unknown_type_uses_fallback_rule() {
        let clock = Arc::new(ManualClock::new(START));
        let kv = Arc::new(MemoryKv::new(clock.clone()));
        let limits = RateLimits::empty().with_rule("api", LimitRule::new(2, 60_000));
        let limiter = RateLimiter::new(kv, clock, limits, FailurePolicy::Open);
        assert!(limiter.check("ip", "mystery").await.allowed);
        assert!(limiter.check("ip", "mystery").await.allowed);
        assert!(!limiter.check("ip", "mystery").await.allowed);
    }

    #[tokio::test]
    async fn test_check_or_throw() {
        let (_clock, _kv, limiter) = limiter(1);
        assert!(limiter.check_or_throw("ip", "notify").await.is_ok());
        let err = limiter.check_or_throw("ip", "notify").await.unwrap_err();
        let RateLimitError::Exceeded { limit_type, reset_at } = err;
        assert_eq!(limit_type, "notify");
        assert_eq!(reset_at, (START / 60_000 + 1) * 60_000);
    }

    #[tokio::test]
    async fn test_reset_clears_current_bucket_only() {
        let (clock, kv, limiter) = limiter(1);
        limiter.check("ip", "notify").await;
        let old_key = bucket_key("notify", "ip", START / 60_000);

        clock.advance(60_000);
        limiter.check("ip", "notify").await;
        assert!(!limiter.check("ip", "notify").await.allowed);

        limiter.reset("ip", "notify").await.unwrap();
        assert!(limiter.check("ip", "notify").await.allowed);
        assert_eq!(kv.get(&old_key).await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_fail_open_when_store_down() {
        let clock = Arc::new(ManualClock::new(START));
        let limits = RateLimits::empty().with_rule("notify", LimitRule::new(5, 60_000));
        let limiter = RateLimiter::new(Arc::new(DownKv), clock, limits, FailurePolicy::Open);
        let decision = limiter.check("ip", "notify").await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 5);
        assert_eq!(decision.reset_at, START + 60_000);
    }

    #[tokio::test]
    async fn test_fail_closed_when_store_down() {
        let clock = Arc::new(ManualClock::new(START));
        let limits = RateLimits::empty().with_rule("notify", LimitRule::new(5, 60_000));
        let limiter = RateLimiter::new(Arc::new(DownKv), clock, limits, FailurePolicy::Closed);
        let decision = limiter.check("ip", "notify").await;
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert!(limiter.check_or_throw("ip", "notify").await.is_err());
        assert!(limiter.reset("ip", "notify").await.is_err());
    }
}
