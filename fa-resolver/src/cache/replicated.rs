//! Primary store plus asynchronously converging replicas
//!
//! Reads are served by the primary. Writes land on the primary and are
//! copied to the replicas in the background, so replicas may lag. Deletes
//! reach the primary and every replica before returning: a purge must not
//! leave an outdated value behind in another region. A delete first waits
//! for that key's background writes, so none of them can land after it.

use super::{CacheEntry, CacheError, CacheStore};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct ReplicatedCacheStore {
    primary: Arc<dyn CacheStore>,
    replicas: Vec<Arc<dyn CacheStore>>,
    /// Background replica writes per key
    pending: Mutex<HashMap<String, Vec<JoinHandle<()>>>>,
}

impl ReplicatedCacheStore {
    pub fn new(primary: Arc<dyn CacheStore>, replicas: Vec<Arc<dyn CacheStore>>) -> Self {
        Self {
            primary,
            replicas,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    /// Wait until every background write started so far has reached its replica
    pub async fn sync(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.drain().flat_map(|(_, handles)| handles).collect()
        };
        join_all(handles).await;
    }

    /// Wait for the background writes of one key
    async fn settle(&self, key: &str) {
        let handles = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.remove(key).unwrap_or_default()
        };
        if !handles.is_empty() {
            debug!(key = %key, writes = handles.len(), "Waiting for replica writes before delete");
            join_all(handles).await;
        }
    }

    fn track(&self, key: &str, handle: JoinHandle<()>) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|_, handles| {
            handles.retain(|h| !h.is_finished());
            !handles.is_empty()
        });
        pending.entry(key.to_string()).or_default().push(handle);
    }
}

#[async_trait]
impl CacheStore for ReplicatedCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        self.primary.get(key).await
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        self.primary.set(key, entry.clone()).await?;

        for replica in &self.replicas {
            let replica = Arc::clone(replica);
            let owned_key = key.to_string();
            let entry = entry.clone();
            self.track(
                key,
                tokio::spawn(async move {
                    if let Err(e) = replica.set(&owned_key, entry).await {
                        warn!(key = %owned_key, replica = replica.name(), error = %e, "Replica write failed");
                    }
                }),
            );
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.settle(key).await;

        let stores = std::iter::once(&self.primary).chain(self.replicas.iter());
        let results = join_all(stores.map(|store| store.delete(key))).await;

        // Every copy is attempted before reporting the first failure
        results.into_iter().collect::<Result<Vec<()>, CacheError>>()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "replicated"
    }
}
