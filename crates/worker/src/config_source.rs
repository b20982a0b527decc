use common::cache::TtlCache;
use common::channel_config::ChannelConfig;
pub use common::channel_config::CONFIG_KEY;
use common::clock::Clock;
use std::sync::Arc;
use store::{KvStore, StoreError};
use tracing::warn;

/// Read-through view of the stored channel configuration.
pub struct ConfigSource {
    store: Arc<dyn KvStore>,
    cache: TtlCache<ChannelConfig>,
    ttl_ms: i64,
}

impl ConfigSource {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, ttl_ms: i64) -> Self {
        Self {
            store,
            cache: TtlCache::new(clock, 16),
            ttl_ms,
        }
    }

    pub async fn load(&self) -> Result<ChannelConfig, StoreError> {
        if let Some(config) = self.cache.get(CONFIG_KEY) {
            return Ok(config);
        }

        let config = match self.store.get(CONFIG_KEY).await? {
            Some(raw) => ChannelConfig::parse(&raw).unwrap_or_else(|err| {
                warn!(error = %err, "stored channel configuration is malformed, using empty");
                ChannelConfig::default()
            }),
            None => {
                warn!("no channel configuration stored");
                ChannelConfig::default()
            }
        };

        self.cache.insert(CONFIG_KEY, config.clone(), self.ttl_ms);
        Ok(config)
    }

    pub fn invalidate(&self) {
        self.cache.remove(CONFIG_KEY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::clock::ManualClock;
    use common::types::ChannelType;
    use store::MemoryKv;

    const CONFIG: &str = r#"{"enabledNotifiers":["email"],"email":{"toEmail":"a@test.com"}}"#;

    fn source() -> (Arc<ManualClock>, Arc<MemoryKv>, ConfigSource) {
        let clock = Arc::new(ManualClock::new(0));
        let kv = Arc::new(MemoryKv::new(clock.clone()));
        let source = ConfigSource::new(kv.clone(), clock.clone(), 60_000);
        (clock, kv, source)
    }

    #[tokio::test]
    async fn test_loads_and_parses() {
        let (_clock, kv, source) = source();
        kv.put(CONFIG_KEY, CONFIG, None).await.unwrap();
        let config = source.load().await.unwrap();
        assert!(config.is_enabled(ChannelType::Email));
        assert_eq!(config.email.recipients, vec!["a@test.com"]);
    }

    #[tokio::test]
    async fn test_cached_until_ttl() {
        let (clock, kv, source) = source();
        kv.put(CONFIG_KEY, CONFIG, None).await.unwrap();
        source.load().await.unwrap();

        kv.put(CONFIG_KEY, r#"{"enabledNotifiers":[]}"#, None).await.unwrap();
        assert!(source.load().await.unwrap().is_enabled(ChannelType::Email));

        clock.advance(60_001);
        assert!(!source.load().await.unwrap().is_enabled(ChannelType::Email));
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let (_clock, kv, source) = source();
        source.load().await.unwrap();
        kv.put(CONFIG_KEY, CONFIG, None).await.unwrap();
        source.invalidate();
        assert!(source.load().await.unwrap().is_enabled(ChannelType::Email));
    }

    #[tokio::test]
    async fn test_malformed_and_missing_are_empty() {
        let (_clock, kv, source) = source();
        assert_eq!(source.load().await.unwrap(), ChannelConfig::default());
        source.invalidate();
        kv.put(CONFIG_KEY, "{broken", None).await.unwrap();
        assert_eq!(source.load().await.unwrap(), ChannelConfig::default());
    }
}
