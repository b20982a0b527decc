use async_trait::async_trait;
use common::clock::{Clock, SystemClock};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::kv::{parse_count, KvStore};
use crate::StoreError;

struct Slot {
    value: String,
    expires_at_ms: Option<i64>,
}

/// Process-local store with clock-driven expiry.
pub struct MemoryKv {
    slots: Mutex<HashMap<String, Slot>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl MemoryKv {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn deadline(&self, ttl: Option<Duration>) -> Option<i64> {
        ttl.map(|ttl| {
            self.clock
                .now_ms()
                .saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
        })
    }

    /// Remaining time to live of `key`, if it exists and expires.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now_ms();
        let slots = self.slots.lock();
        let expires_at = slots.get(key)?.expires_at_ms?;
        u64::try_from(expires_at - now).ok().map(Duration::from_millis)
    }

    fn live<'a>(slots: &'a mut HashMap<String, Slot>, key: &str, now: i64) -> Option<&'a Slot> {
        let expired = matches!(slots.get(key), Some(Slot { expires_at_ms: Some(at), .. }) if *at <= now);
        if expired {
            slots.remove(key);
            return None;
        }
        slots.get(key)
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = self.clock.now_ms();
        let mut slots = self.slots.lock();
        Ok(Self::live(&mut slots, key, now).map(|slot| slot.value.clone()))
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let expires_at_ms = self.deadline(ttl);
        self.slots.lock().insert(
            key.to_string(),
            Slot {
                value: value.to_string(),
                expires_at_ms,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.slots.lock().remove(key);
        Ok(())
    }

    async fn bump_counter(
        &self,
        key: &str,
        ceiling: u64,
        ttl: Duration,
    ) -> Result<(u64, bool), StoreError> {
        let now = self.clock.now_ms();
        let expires_at_ms = self.deadline(Some(ttl));
        let mut slots = self.slots.lock();
        let current = parse_count(key, Self::live(&mut slots, key, now).map(|s| s.value.clone()))?;
        if current >= ceiling {
            return Ok((current, false));
        }
        slots.insert(
            key.to_string(),
            Slot {
                value: (current + 1).to_string(),
                expires_at_ms,
            },
        );
        Ok((current, true))
    }
}
