//! Shared fixtures for fa-resolver integration tests
#![allow(dead_code)]

pub mod fake_wiki;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use fa_common::config::TomlConfig;
use fa_common::time::ManualClock;
use fa_resolver::cache::MemoryCacheStore;
use fa_resolver::clients::ApiClient;
use fa_resolver::db::SqliteAnnotationStore;
use fa_resolver::html::plain_paragraph;
use fa_resolver::markup::{MarkupRenderer, RenderContext, RenderError};
use fa_resolver::models::{Annotation, AnnotationSet};
use fa_resolver::store::AnnotationStore;
use fa_resolver::watermarks::MemoryWatermarks;
use fa_resolver::{AppState, Collaborators};
use fake_wiki::FakeWiki;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const CAT_CATEGORY_HREF: &str = "https://commons.wikimedia.org/wiki/Category:Cats";
pub const DOUGLAS_ADAMS_HREF: &str = "https://www.wikidata.org/wiki/Q42";
pub const CAT_ARTICLE_HREF: &str = "https://en.wikipedia.org/wiki/Cat";

/// `<p><a href=…>…</a></p>`, the shape the classifier enriches
pub fn lone_link(href: &str, text: &str) -> String {
    format!(r#"<p><a href="{}">{}</a></p>"#, href, text)
}

/// Renderer with canned output per wikitext; anything else renders as a plain paragraph
#[derive(Default)]
pub struct StubRenderer {
    outputs: HashMap<String, String>,
    delay: Option<Duration>,
}

impl StubRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, text: &str, html: &str) -> Self {
        self.outputs.insert(text.to_string(), html.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl MarkupRenderer for StubRenderer {
    async fn render(&self, text: &str, _context: &RenderContext) -> Result<String, RenderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .outputs
            .get(text)
            .cloned()
            .unwrap_or_else(|| plain_paragraph(text)))
    }
}

/// Single-connection in-memory database with the service schema
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    fa_resolver::db::init_tables(&pool).await.unwrap();
    pool
}

/// Configuration pointing every remote endpoint at the fake server
pub fn config_for(base: &str) -> TomlConfig {
    let mut config = TomlConfig::default();
    config.endpoints.commons_api = format!("{}/commons/w/api.php", base);
    config.endpoints.wikipedia_api = format!("{}/{{host}}/w/api.php", base);
    config.endpoints.wikidata_api = format!("{}/wikidata/w/api.php", base);
    config.endpoints.wikidata_sparql = format!("{}/sparql", base);
    config.endpoints.render_api = format!("{}/commons/w/api.php", base);
    config.http.requests_per_second = 1_000;
    config.http.timeout_secs = 5;
    config
}

/// A fully wired service against the fake remote APIs
pub struct Harness {
    pub state: AppState,
    pub fake: Arc<FakeWiki>,
    pub clock: ManualClock,
    pub cache: Arc<MemoryCacheStore>,
    pub store: Arc<SqliteAnnotationStore>,
    pub watermarks: Arc<MemoryWatermarks>,
    pub config: TomlConfig,
}

impl Harness {
    pub async fn start(renderer: StubRenderer) -> Self {
        Self::start_with(renderer, |_| {}).await
    }

    /// Start with a chance to adjust the configuration first
    pub async fn start_with(renderer: StubRenderer, adjust: impl FnOnce(&mut TomlConfig)) -> Self {
        let fake = Arc::new(FakeWiki::default());
        let addr = fake.serve().await;

        let mut config = config_for(&format!("http://{}", addr));
        adjust(&mut config);

        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
        let cache = Arc::new(MemoryCacheStore::with_clock(
            config.cache.max_entries,
            Arc::new(clock.clone()),
        ));
        let store = Arc::new(SqliteAnnotationStore::new(memory_pool().await));
        let watermarks = Arc::new(MemoryWatermarks::new());
        let api = Arc::new(ApiClient::new(&config.http).unwrap());

        let state = AppState::assemble(
            &config,
            api,
            Collaborators {
                store: store.clone(),
                cache_store: cache.clone(),
                renderer: Arc::new(renderer),
                watermarks: watermarks.clone(),
                clock: Arc::new(clock.clone()),
            },
        );

        Self {
            state,
            fake,
            clock,
            cache,
            store,
            watermarks,
            config,
        }
    }

    /// Store a page holding annotations with the given contents
    pub async fn put_page(&self, title: &str, contents: &[&str]) {
        let set = AnnotationSet {
            annotations: contents.iter().map(|c| Annotation::new(*c)).collect(),
            revision: self.store.get_annotations(title).await.unwrap().and_then(|s| s.revision),
        };
        self.store
            .replace_annotations(title, &set, "test fixture")
            .await
            .unwrap();
    }
}
