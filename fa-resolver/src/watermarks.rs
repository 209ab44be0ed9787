//! Freshness watermarks
//!
//! A watermark is the time of the latest write a viewer is known to have
//! made to a remote source. Cached fragments computed before it are too old
//! to show that viewer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[async_trait]
pub trait WriteWatermarks: Send + Sync {
    async fn last_observed_write(&self, viewer: &str, source: &str) -> Option<DateTime<Utc>>;

    /// Record a write; a timestamp older than the current watermark is ignored
    async fn record_write(&self, viewer: &str, source: &str, at: DateTime<Utc>);
}

/// Process-local watermarks keyed by (viewer, source)
#[derive(Default)]
pub struct MemoryWatermarks {
    marks: RwLock<HashMap<(String, String), DateTime<Utc>>>,
}

impl MemoryWatermarks {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WriteWatermarks for MemoryWatermarks {
    async fn last_observed_write(&self, viewer: &str, source: &str) -> Option<DateTime<Utc>> {
        self.marks
            .read()
            .await
            .get(&(viewer.to_string(), source.to_string()))
            .copied()
    }

    async fn record_write(&self, viewer: &str, source: &str, at: DateTime<Utc>) {
        let mut marks = self.marks.write().await;
        let mark = marks
            .entry((viewer.to_string(), source.to_string()))
            .or_insert(at);
        if at > *mark {
            *mark = at;
        }
        tracing::debug!(viewer = %viewer, source = %source, at = %mark, "Recorded write watermark");
    }
}
