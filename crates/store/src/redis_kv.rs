use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;

use crate::kv::KvStore;
use crate::StoreError;

const BUMP_SCRIPT: &str = r#"
local key = KEYS[1]
local ceiling = tonumber(ARGV[1])
local ttl = tonumber(ARGV[2])

local current = tonumber(redis.call('GET', key) or '0')
if current == nil then
  return redis.error_reply('not a counter')
end

if current >= ceiling then
  return {current, 0}
end

redis.call('SET', key, current + 1, 'EX', ttl)
return {current, 1}
"#;

#[derive(Clone)]
pub struct RedisKv {
    client: redis::Client,
}

impl RedisKv {
    pub fn open(url: &str) -> Result<Self, StoreError> {
        Ok(Self {
            client: redis::Client::open(url)?,
        })
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

/// Redis expiries are whole seconds; never round a live key down to zero.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn().await?;
        Ok(conn.get(key).await?)
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        match ttl {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl)).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn bump_counter(
        &self,
        key: &str,
        ceiling: u64,
        ttl: Duration,
    ) -> Result<(u64, bool), StoreError> {
        let mut conn = self.conn().await?;
        let (current, bumped): (u64, i32) = redis::Script::new(BUMP_SCRIPT)
            .key(key)
            .arg(ceiling)
            .arg(ttl_secs(ttl))
            .invoke_async(&mut conn)
            .await?;
        Ok((current, bumped == 1))
    }
}
