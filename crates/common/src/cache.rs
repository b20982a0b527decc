//! Small read-through cache with per-entry expiry.
//!
//! Never authoritative: callers always fall back to the durable store on a
//! miss, and entries vanish once the injected clock passes their deadline.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::clock::Clock;

struct CacheItem<V> {
    value: V,
    expires_at_ms: i64,
}

pub struct TtlCache<V> {
    items: Mutex<HashMap<String, CacheItem<V>>>,
    clock: Arc<dyn Clock>,
    capacity: usize,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(clock: Arc<dyn Clock>, capacity: usize) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            clock,
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now_ms();
        let mut items = self.items.lock();
        let expired = match items.get(key) {
            Some(item) if now <= item.expires_at_ms => return Some(item.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            items.remove(key);
        }
        None
    }

    pub fn insert(&self, key: &str, value: V, ttl_ms: i64) {
        let now = self.clock.now_ms();
        let mut items = self.items.lock();
        if items.len() >= self.capacity && !items.contains_key(key) {
            items.retain(|_, item| now <= item.expires_at_ms);
            if items.len() >= self.capacity {
                // Still full: drop whichever entry expires first.
                if let Some(victim) = items
                    .iter()
                    .min_by_key(|(_, item)| item.expires_at_ms)
                    .map(|(k, _)| k.clone())
                {
                    items.remove(&victim);
                }
            }
        }
        items.insert(
            key.to_string(),
            CacheItem {
                value,
                expires_at_ms: now.saturating_add(ttl_ms),
            },
        );
    }

    pub fn remove(&self, key: &str) -> bool {
        self.items.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.items.lock().clear();
    }

    /// Live entries, purging expired ones first.
    pub fn len(&self) -> usize {
        let now = self.clock.now_ms();
        let mut items = self.items.lock();
        items.retain(|_, item| now <= item.expires_at_ms);
        items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
