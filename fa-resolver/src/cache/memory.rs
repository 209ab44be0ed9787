//! In-process cache store

use super::{CacheEntry, CacheError, CacheStore};
use async_trait::async_trait;
use fa_common::time::{Clock, SystemClock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Bounded map of cache entries
///
/// When full, entries past their stale window go first, then the oldest.
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
    max_entries: usize,
    clock: Arc<dyn Clock>,
}

impl MemoryCacheStore {
    pub fn new(max_entries: usize) -> Self {
        Self::with_clock(max_entries, Arc::new(SystemClock))
    }

    pub fn with_clock(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
            clock,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn prune(&self, entries: &mut HashMap<String, CacheEntry>) {
        let now = self.clock.now();
        let before = entries.len();

        entries.retain(|_, entry| entry.is_servable_stale(now));

        if entries.len() >= self.max_entries {
            let mut by_age: Vec<(String, chrono::DateTime<chrono::Utc>)> = entries
                .iter()
                .map(|(key, entry)| (key.clone(), entry.stored_at))
                .collect();
            by_age.sort_by_key(|(_, stored_at)| *stored_at);

            let excess = entries.len() + 1 - self.max_entries;
            for (key, _) in by_age.into_iter().take(excess) {
                entries.remove(&key);
            }
        }

        debug!(removed = before - entries.len(), "Pruned memory cache");
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        if !entries.contains_key(key) && entries.len() >= self.max_entries {
            self.prune(&mut entries);
        }
        entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fa_common::time::ManualClock;

    fn entry(clock: &ManualClock, value: &str, ttl: u64) -> CacheEntry {
        CacheEntry {
            value: value.to_string(),
            stored_at: clock.now(),
            ttl_secs: ttl,
            stale_ttl_secs: 0,
        }
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryCacheStore::new(10);
        let clock = ManualClock::new(Utc::now());

        store.set("k", entry(&clock, "v", 60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().unwrap().value, "v");

        store.delete("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_overflow_drops_expired_first() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        let store = MemoryCacheStore::with_clock(2, Arc::new(clock.clone()));

        store.set("long", entry(&clock, "a", 1000)).await.unwrap();
        clock.advance_secs(1);
        store.set("short", entry(&clock, "b", 5)).await.unwrap();
        clock.advance_secs(10);

        store.set("new", entry(&clock, "c", 60)).await.unwrap();

        assert_eq!(store.len().await, 2);
        assert!(store.get("short").await.unwrap().is_none());
        assert!(store.get("long").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_overflow_drops_oldest_when_nothing_expired() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        let store = MemoryCacheStore::with_clock(2, Arc::new(clock.clone()));

        store.set("first", entry(&clock, "a", 1000)).await.unwrap();
        clock.advance_secs(1);
        store.set("second", entry(&clock, "b", 1000)).await.unwrap();
        clock.advance_secs(1);
        store.set("third", entry(&clock, "c", 1000)).await.unwrap();

        assert_eq!(store.len().await, 2);
        assert!(store.get("first").await.unwrap().is_none());
        assert!(store.get("third").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_overwrite_does_not_evict() {
        let clock = ManualClock::new(Utc::now());
        let store = MemoryCacheStore::with_clock(1, Arc::new(clock.clone()));

        store.set("k", entry(&clock, "a", 60)).await.unwrap();
        store.set("k", entry(&clock, "b", 60)).await.unwrap();

        assert_eq!(store.get("k").await.unwrap().unwrap().value, "b");
    }
}
