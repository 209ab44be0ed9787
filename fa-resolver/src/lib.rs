//! fa-resolver library interface
//!
//! Resolution of file annotations into display HTML: link classification,
//! remote enrichment, rendered-fragment caching, annotation storage and the
//! HTTP API over all of it.

pub mod api;
pub mod cache;
pub mod classifier;
pub mod clients;
pub mod config;
pub mod db;
pub mod editor;
pub mod enrich;
pub mod error;
pub mod html;
pub mod markup;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod render;
pub mod store;
pub mod watermarks;

pub use crate::error::{ApiError, ApiResult};

use crate::cache::{
    CacheCoordinator, CacheStore, MemoryCacheStore, ReplicatedCacheStore, SqliteCacheStore, TtlSettings,
};
use crate::clients::commons::CommonsClient;
use crate::clients::wikidata::WikidataClient;
use crate::clients::wikipedia::WikipediaClient;
use crate::clients::ApiClient;
use crate::enrich::{Clients, EnrichSettings, Enricher};
use crate::markup::MarkupRenderer;
use crate::orchestrator::Orchestrator;
use crate::pipeline::Pipeline;
use crate::store::AnnotationStore;
use crate::watermarks::WriteWatermarks;
use axum::Router;
use chrono::{DateTime, Utc};
use fa_common::config::{CacheBackend, CacheSettings, TomlConfig};
use fa_common::time::Clock;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

/// Swappable collaborators of the service
pub struct Collaborators {
    pub store: Arc<dyn AnnotationStore>,
    pub cache_store: Arc<dyn CacheStore>,
    pub renderer: Arc<dyn MarkupRenderer>,
    pub watermarks: Arc<dyn WriteWatermarks>,
    pub clock: Arc<dyn Clock>,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<dyn AnnotationStore>,
    pub watermarks: Arc<dyn WriteWatermarks>,
    pub clock: Arc<dyn Clock>,
    /// Viewer language when a request names none
    pub default_language: String,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire the resolution engine from configuration and collaborators
    pub fn assemble(config: &TomlConfig, api: Arc<ApiClient>, parts: Collaborators) -> Self {
        let endpoints = &config.endpoints;

        let cache = Arc::new(CacheCoordinator::new(
            parts.cache_store,
            Arc::clone(&parts.clock),
            TtlSettings::from(&config.cache),
        ));

        let clients = Clients {
            commons: Arc::new(CommonsClient::new(Arc::clone(&api), endpoints.commons_api.clone())),
            wikipedia: Arc::new(WikipediaClient::new(Arc::clone(&api), endpoints.wikipedia_api.clone())),
            wikidata: Arc::new(WikidataClient::new(
                Arc::clone(&api),
                endpoints.wikidata_api.clone(),
                endpoints.wikidata_sparql.clone(),
            )),
        };

        let enricher = Arc::new(Enricher::new(
            cache,
            Arc::clone(&parts.watermarks),
            clients,
            EnrichSettings {
                max_ttl_secs: config.cache.max_ttl_secs,
                discovery_ttl_secs: config.cache.discovery_ttl_secs,
                commons_wiki: endpoints.commons_wiki.clone(),
                image_property_class: endpoints.image_property_class.clone(),
            },
        ));

        let pipeline = Arc::new(Pipeline::new(parts.renderer, enricher));
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&parts.store),
            pipeline,
            Duration::from_millis(config.request_deadline_ms),
        ));

        Self {
            orchestrator,
            store: parts.store,
            watermarks: parts.watermarks,
            startup_time: parts.clock.now(),
            clock: parts.clock,
            default_language: config.default_language.clone(),
        }
    }
}

/// Cache store selected by `[cache] backend`
///
/// The sqlite backend uses the service database as primary; each configured
/// replica path becomes an asynchronously updated replica.
pub async fn open_cache_store(
    settings: &CacheSettings,
    pool: &SqlitePool,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<Arc<dyn CacheStore>> {
    match settings.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryCacheStore::with_clock(settings.max_entries, clock))),
        CacheBackend::Sqlite => {
            let primary: Arc<dyn CacheStore> = Arc::new(SqliteCacheStore::new(pool.clone()));
            if settings.replica_paths.is_empty() {
                return Ok(primary);
            }

            let mut replicas: Vec<Arc<dyn CacheStore>> = Vec::new();
            for path in &settings.replica_paths {
                let replica_pool = db::init_database_pool(path).await?;
                tracing::info!("Cache replica: {}", path.display());
                replicas.push(Arc::new(SqliteCacheStore::new(replica_pool)));
            }
            Ok(Arc::new(ReplicatedCacheStore::new(primary, replicas)))
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::fileannotation_routes())
        .merge(api::annotation_routes())
        .merge(api::watermark_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
