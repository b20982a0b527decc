//! Bounded log of recent delivery failures, kept as one JSON array in the
//! key-value store (oldest first).

use common::types::FailureEntry;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

use crate::kv::KvStore;
use crate::StoreError;

pub const FAILURE_LOG_KEY: &str = "failure_logs";

pub struct FailureLog {
    store: Arc<dyn KvStore>,
    max_records: usize,
    default_limit: usize,
    write_lock: Mutex<()>,
}

impl FailureLog {
    pub fn new(store: Arc<dyn KvStore>, max_records: usize, default_limit: usize) -> Self {
        Self {
            store,
            max_records: max_records.max(1),
            default_limit,
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<FailureEntry>, StoreError> {
        let Some(raw) = self.store.get(FAILURE_LOG_KEY).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => Ok(entries),
            Err(err) => {
                warn!(error = %err, "failure log is not a valid entry list, starting over");
                Ok(Vec::new())
            }
        }
    }

    /// Appends `entry`, evicting the oldest entries beyond the cap.
    ///
    /// Writers in this process are serialized so the read, trim and write
    /// happen as one step.
    pub async fn record(&self, entry: FailureEntry) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;
        entries.push(entry);
        if entries.len() > self.max_records {
            let excess = entries.len() - self.max_records;
            entries.drain(..excess);
        }
        let raw = serde_json::to_string(&entries).map_err(|err| StoreError::Corrupt {
            key: FAILURE_LOG_KEY.to_string(),
            reason: err.to_string(),
        })?;
        self.store.put(FAILURE_LOG_KEY, &raw, None).await
    }

    /// Most recent entries first. `None` uses the configured default limit.
    pub async fn list(&self, limit: Option<usize>) -> Result<Vec<FailureEntry>, StoreError> {
        let limit = limit.unwrap_or(self.default_limit);
        let entries = self.load().await?;
        Ok(entries.into_iter().rev().take(limit).collect())
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.store.delete(FAILURE_LOG_KEY).await
    }
}
