//! Rendered-fragment cache
//!
//! [`CacheStore`] is the storage capability (get/set/delete); the
//! [`CacheCoordinator`](coordinator::CacheCoordinator) layers read-through,
//! single-flight, elastic TTL and freshness floors on top of any store.

pub mod coordinator;
pub mod memory;
pub mod replicated;
pub mod single_flight;
pub mod sqlite;

pub use coordinator::{CacheCoordinator, CachePolicy, Computed, TtlSettings};
pub use memory::MemoryCacheStore;
pub use replicated::ReplicatedCacheStore;
pub use sqlite::SqliteCacheStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fa_common::time::age_secs;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Prefix of every key this service writes
pub const KEY_PREFIX: &str = "fileannotations";

/// Keys longer than this are shortened with a digest
pub const MAX_KEY_LEN: usize = 200;

/// Characters kept unencoded in key components
const KEY_COMPONENT_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Cache backend errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("Cache serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::Unavailable(e.to_string())
    }
}

/// One cached fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: String,
    /// When the value was computed
    pub stored_at: DateTime<Utc>,
    pub ttl_secs: u64,
    /// How long past expiry the value may still be served when a refresh fails
    pub stale_ttl_secs: u64,
}

impl CacheEntry {
    pub fn age_secs(&self, now: DateTime<Utc>) -> u64 {
        age_secs(self.stored_at, now)
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.age_secs(now) < self.ttl_secs
    }

    /// Still usable as a stale fallback
    pub fn is_servable_stale(&self, now: DateTime<Utc>) -> bool {
        self.age_secs(now) < self.ttl_secs.saturating_add(self.stale_ttl_secs)
    }

    /// Computed no earlier than `floor`, if there is one
    pub fn satisfies_floor(&self, floor: Option<DateTime<Utc>>) -> bool {
        floor.map_or(true, |floor| self.stored_at >= floor)
    }
}

/// Key-value storage for cache entries
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    async fn set(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError>;

    /// Remove `key` everywhere the store keeps copies
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// `fileannotations:<component>:<component>...`
///
/// Components are percent-encoded so that separators inside titles cannot
/// collide. Overlong keys keep a readable prefix and end in the SHA-256 of
/// the full key.
pub fn make_key(components: &[&str]) -> String {
    let mut key = String::from(KEY_PREFIX);
    for component in components {
        key.push(':');
        key.extend(utf8_percent_encode(component, KEY_COMPONENT_SET));
    }

    if key.len() <= MAX_KEY_LEN {
        return key;
    }

    let digest = hex(&Sha256::digest(key.as_bytes()));
    // Encoded keys are ASCII, so any byte offset is a char boundary
    let keep = MAX_KEY_LEN - digest.len() - 1;
    format!("{}#{}", &key[..keep], digest)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
