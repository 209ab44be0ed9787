//! Read-through cache coordination
//!
//! One generic entry point, [`CacheCoordinator::get_or_compute`], used by
//! every enrichment kind. Per key the lifecycle is
//! `Absent -> Computing -> Cached -> (Cached | Computing)`, with
//! `Cached -> Absent` on purge.
//!
//! - Misses are computed once per process; concurrent callers share the result.
//! - A freshness floor turns entries computed before it into misses.
//! - TTLs are elastic: an unchanged recomputation doubles the entry's
//!   observed age, a changed one drops to the minimum.
//! - When a floor is in force and the recomputed value differs from the
//!   stored one, the key is deleted from every replica instead of overwritten.
//! - Uncacheable results (failed fetches) are returned but never stored.
//! - Backend errors degrade to computing without the cache.

use super::single_flight::SingleFlight;
use super::{CacheEntry, CacheStore};
use chrono::{DateTime, Utc};
use fa_common::config::CacheSettings;
use fa_common::time::Clock;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// TTL bounds shared by every key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlSettings {
    pub min_ttl_secs: u64,
    pub max_ttl_secs: u64,
    pub stale_ttl_secs: u64,
}

impl From<&CacheSettings> for TtlSettings {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            min_ttl_secs: settings.min_ttl_secs,
            max_ttl_secs: settings.max_ttl_secs,
            stale_ttl_secs: settings.stale_ttl_secs,
        }
    }
}

/// Per-call cache policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Upper bound of the elastic TTL for this key
    pub max_ttl_secs: u64,
    /// Entries computed before this instant count as misses
    pub min_as_of: Option<DateTime<Utc>>,
    /// False stores every value for exactly `max_ttl_secs`
    pub elastic: bool,
}

impl CachePolicy {
    /// Elastic TTL up to `max_ttl_secs`
    pub fn new(max_ttl_secs: u64) -> Self {
        Self {
            max_ttl_secs,
            min_as_of: None,
            elastic: true,
        }
    }

    /// Fixed TTL, for slow-moving data
    pub fn fixed(ttl_secs: u64) -> Self {
        Self {
            max_ttl_secs: ttl_secs,
            min_as_of: None,
            elastic: false,
        }
    }

    pub fn with_floor(mut self, min_as_of: Option<DateTime<Utc>>) -> Self {
        self.min_as_of = min_as_of;
        self
    }
}

/// Result of a computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Computed {
    pub value: String,
    /// False when the value is a fallback for a failed fetch
    pub cacheable: bool,
}

impl Computed {
    pub fn cacheable(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            cacheable: true,
        }
    }

    pub fn uncacheable(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            cacheable: false,
        }
    }
}

pub struct CacheCoordinator {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    ttl: TtlSettings,
    flights: SingleFlight<String>,
}

impl CacheCoordinator {
    pub fn new(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>, ttl: TtlSettings) -> Self {
        Self {
            store,
            clock,
            ttl,
            flights: SingleFlight::new(),
        }
    }

    pub fn ttl_settings(&self) -> TtlSettings {
        self.ttl
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.name()
    }

    /// Cached value for `key`, computing and storing it on a miss
    pub async fn get_or_compute<F, Fut>(&self, key: &str, policy: CachePolicy, compute: F) -> String
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Computed> + Send + 'static,
    {
        match self.store.get(key).await {
            Ok(Some(entry)) if usable(&entry, self.clock.now(), policy.min_as_of) => {
                debug!(key = %key, age_secs = entry.age_secs(self.clock.now()), "Cache hit");
                return entry.value;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(key = %key, backend = self.store.name(), error = %e, "Cache backend failure, computing without cache");
                return compute().await.value;
            }
        }

        let flight = Flight {
            key: key.to_string(),
            policy,
            ttl: self.ttl,
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        };

        let (value, leader) = self.flights.run(key, flight.run(compute)).await;
        if !leader {
            debug!(key = %key, "Joined in-flight computation");
        }
        value
    }
}

fn usable(entry: &CacheEntry, now: DateTime<Utc>, floor: Option<DateTime<Utc>>) -> bool {
    entry.is_fresh(now) && entry.satisfies_floor(floor)
}

/// Elastic TTL for a new value given the entry it replaces
///
/// Unchanged: twice the prior entry's age, capped at `max_ttl`. Changed or
/// first store: `min(min_ttl, max_ttl)`. An unchanged value recomputed at
/// age zero also gets the minimum, so a stored entry never has a zero TTL.
pub fn elastic_ttl(prior: Option<&CacheEntry>, value: &str, now: DateTime<Utc>, ttl: TtlSettings, max_ttl_secs: u64) -> u64 {
    let minimum = ttl.min_ttl_secs.min(max_ttl_secs);
    match prior {
        Some(prior) if prior.value == value => match prior.age_secs(now).saturating_mul(2).min(max_ttl_secs) {
            0 => minimum,
            doubled => doubled,
        },
        _ => minimum,
    }
}

/// Everything one miss computation needs, owned so it can outlive its caller
struct Flight {
    key: String,
    policy: CachePolicy,
    ttl: TtlSettings,
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
}

impl Flight {
    async fn run<F, Fut>(self, compute: F) -> String
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Computed> + Send + 'static,
    {
        let key = self.key.as_str();

        // Another process may have filled the key since the first read
        let prior = match self.store.get(key).await {
            Ok(Some(entry)) if usable(&entry, self.clock.now(), self.policy.min_as_of) => {
                debug!(key = %key, "Cache filled while waiting");
                return entry.value;
            }
            Ok(prior) => prior,
            Err(e) => {
                warn!(key = %key, backend = self.store.name(), error = %e, "Cache backend failure, computing without cache");
                return compute().await.value;
            }
        };

        debug!(key = %key, had_prior = prior.is_some(), floor = ?self.policy.min_as_of, "Cache miss");

        let computed = compute().await;
        let now = self.clock.now();

        if !computed.cacheable {
            if let Some(prior) = prior.filter(|p| p.is_servable_stale(now) && p.satisfies_floor(self.policy.min_as_of)) {
                warn!(key = %key, age_secs = prior.age_secs(now), "Recompute failed, serving stale value");
                return prior.value;
            }
            debug!(key = %key, "Result not cacheable");
            return computed.value;
        }

        let diverged = prior.as_ref().is_some_and(|p| p.value != computed.value);

        if self.policy.min_as_of.is_some() && diverged {
            info!(key = %key, "Value changed under freshness floor, purging");
            if let Err(e) = self.store.delete(key).await {
                warn!(key = %key, error = %e, "Cache purge failed");
            }
            return computed.value;
        }

        let ttl_secs = if self.policy.elastic {
            elastic_ttl(prior.as_ref(), &computed.value, now, self.ttl, self.policy.max_ttl_secs)
        } else {
            self.policy.max_ttl_secs
        };
        let entry = CacheEntry {
            value: computed.value,
            stored_at: now,
            ttl_secs,
            stale_ttl_secs: self.ttl.stale_ttl_secs,
        };

        debug!(key = %key, ttl_secs, changed = diverged, "Storing cache entry");

        if let Err(e) = self.store.set(key, entry.clone()).await {
            warn!(key = %key, error = %e, "Cache write failed");
        }

        entry.value
    }
}
