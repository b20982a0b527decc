pub mod failure_log;
pub mod kv;
pub mod memory;
pub mod rate_limit;
pub mod redis_kv;

pub use failure_log::FailureLog;
pub use kv::KvStore;
pub use memory::MemoryKv;
pub use rate_limit::{RateLimitDecision, RateLimitError, RateLimiter};
pub use redis_kv::RedisKv;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt value at {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}
