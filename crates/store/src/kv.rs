//! Minimal key-value contract shared by the rate limiter and failure log.

use async_trait::async_trait;
use std::time::Duration;

use crate::StoreError;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes `value`, replacing any previous value and expiry.
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Increments the decimal counter at `key` unless it already reached
    /// `ceiling`, refreshing its expiry to `ttl` on increment.
    ///
    /// Returns the count observed *before* the call and whether it was
    /// incremented. The default goes through `get`/`put` and is only safe for a
    /// single caller; implementations backed by shared storage override it
    /// with an atomic compare-and-increment.
    async fn bump_counter(
        &self,
        key: &str,
        ceiling: u64,
        ttl: Duration,
    ) -> Result<(u64, bool), StoreError> {
        let current = parse_count(key, self.get(key).await?)?;
        if current >= ceiling {
            return Ok((current, false));
        }
        self.put(key, &(current + 1).to_string(), Some(ttl)).await?;
        Ok((current, true))
    }
}

pub(crate) fn parse_count(key: &str, raw: Option<String>) -> Result<u64, StoreError> {
    match raw {
        None => Ok(0),
        Some(raw) => raw.trim().parse().map_err(|_| StoreError::Corrupt {
            key: key.to_string(),
            reason: format!("not a counter: {raw}"),
        }),
    }
}
