//! Cached enrichment of classified links
//!
//! Each link kind supplies only its key and compute function; caching,
//! single-flight and freshness floors come from the [`CacheCoordinator`].
//! Fetch failures never escape: they become an uncacheable fallback fragment.

use crate::cache::{make_key, CacheCoordinator, CachePolicy, Computed};
use crate::clients::commons::{CommonsClient, ENTITY_IMAGE_SIZE};
use crate::clients::wikidata::{pick_image_property, WikidataClient, PREFERRED_IMAGE_PROPERTIES};
use crate::clients::wikipedia::WikipediaClient;
use crate::clients::FetchError;
use crate::models::ClassifiedLink;
use crate::render::{commons_category_html, wiki_page_url, wikidata_html, wikipedia_html};
use crate::watermarks::WriteWatermarks;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

const KIND_COMMONS_CATEGORY: &str = "commonscategory";
const KIND_WIKIPEDIA_PAGE: &str = "wikipediapage";
const KIND_WIKIDATA_ENTITY: &str = "wikidataentity";
const KIND_IMAGE_PROPERTIES: &str = "wikidataimageprops";

/// Settings the enricher needs beyond its clients
#[derive(Debug, Clone)]
pub struct EnrichSettings {
    /// Upper bound of the elastic TTL of enrichment fragments
    pub max_ttl_secs: u64,
    /// Fixed TTL of the discovered image-property list
    pub discovery_ttl_secs: u64,
    /// Page URL base of Commons, for "see more" links
    pub commons_wiki: String,
    /// Wikidata class whose instances are image properties
    pub image_property_class: String,
}

/// Remote clients used for enrichment
pub struct Clients {
    pub commons: Arc<CommonsClient>,
    pub wikipedia: Arc<WikipediaClient>,
    pub wikidata: Arc<WikidataClient>,
}

pub struct Enricher {
    cache: Arc<CacheCoordinator>,
    watermarks: Arc<dyn WriteWatermarks>,
    commons: Arc<CommonsClient>,
    wikipedia: Arc<WikipediaClient>,
    wikidata: Arc<WikidataClient>,
    discovery: Arc<ImagePropertyDiscovery>,
    settings: EnrichSettings,
}

impl Enricher {
    pub fn new(
        cache: Arc<CacheCoordinator>,
        watermarks: Arc<dyn WriteWatermarks>,
        clients: Clients,
        settings: EnrichSettings,
    ) -> Self {
        let discovery = Arc::new(ImagePropertyDiscovery {
            cache: Arc::clone(&cache),
            wikidata: Arc::clone(&clients.wikidata),
            property_class: settings.image_property_class.clone(),
            ttl_secs: settings.discovery_ttl_secs,
        });

        Self {
            cache,
            watermarks,
            commons: clients.commons,
            wikipedia: clients.wikipedia,
            wikidata: clients.wikidata,
            discovery,
            settings,
        }
    }

    /// Enriched fragment for `link`, or `None` when the link is not enrichable
    ///
    /// `viewer` selects the freshness floor; anonymous viewers have none.
    pub async fn enrich(&self, link: &ClassifiedLink, viewer: Option<&str>, language: &str) -> Option<String> {
        let source = link.source()?;
        let floor = self.floor(viewer, source).await;
        let policy = CachePolicy::new(self.settings.max_ttl_secs).with_floor(floor);

        let html = match link {
            ClassifiedLink::None => return None,
            ClassifiedLink::CommonsCategory { name } => self.commons_category(name, policy).await,
            ClassifiedLink::WikipediaArticle { host, article } => {
                self.wikipedia_article(host, article, policy).await
            }
            ClassifiedLink::WikidataEntity { id } => self.wikidata_entity(id, language, policy).await,
        };

        Some(html)
    }

    async fn floor(&self, viewer: Option<&str>, source: &str) -> Option<DateTime<Utc>> {
        let viewer = viewer?;
        let floor = self.watermarks.last_observed_write(viewer, source).await;
        if let Some(at) = floor {
            debug!(viewer = %viewer, source = %source, floor = %at, "Applying freshness floor");
        }
        floor
    }

    async fn commons_category(&self, name: &str, policy: CachePolicy) -> String {
        let key = make_key(&[KIND_COMMONS_CATEGORY, name]);
        let commons = Arc::clone(&self.commons);
        let name = name.to_string();
        let category_url = wiki_page_url(&self.settings.commons_wiki, &name);

        self.cache
            .get_or_compute(&key, policy, move || async move {
                match commons.category_members(&name).await {
                    Ok(members) => Computed::cacheable(commons_category_html(&members, &category_url)),
                    Err(e) => {
                        warn!(category = %name, error = %e, "Commons category fetch failed");
                        Computed::uncacheable(commons_category_html(&[], &category_url))
                    }
                }
            })
            .await
    }

    async fn wikipedia_article(&self, host: &str, article: &str, policy: CachePolicy) -> String {
        let key = make_key(&[KIND_WIKIPEDIA_PAGE, host, article]);
        let wikipedia = Arc::clone(&self.wikipedia);
        let host = host.to_string();
        let article = article.to_string();

        self.cache
            .get_or_compute(&key, policy, move || async move {
                match wikipedia.summary(&host, &article).await {
                    Ok(summary) => Computed::cacheable(wikipedia_html(Some(&summary))),
                    Err(e) => {
                        warn!(host = %host, article = %article, error = %e, "Wikipedia summary fetch failed");
                        Computed::uncacheable(wikipedia_html(None))
                    }
                }
            })
            .await
    }

    async fn wikidata_entity(&self, id: &str, language: &str, policy: CachePolicy) -> String {
        let key = make_key(&[KIND_WIKIDATA_ENTITY, language, id]);
        let wikidata = Arc::clone(&self.wikidata);
        let commons = Arc::clone(&self.commons);
        let discovery = Arc::clone(&self.discovery);
        let id = id.to_string();
        let language = language.to_string();

        self.cache
            .get_or_compute(&key, policy, move || async move {
                let entity = match wikidata.entity(&id, &language).await {
                    Ok(entity) => entity,
                    Err(e) => {
                        warn!(entity = %id, error = %e, "Wikidata entity fetch failed");
                        return Computed::uncacheable(wikidata_html(None, &language, None));
                    }
                };

                // Discovery is only needed when no well-known image property is set
                let has_preferred = PREFERRED_IMAGE_PROPERTIES
                    .iter()
                    .any(|p| entity.claims.contains_key(*p));
                let discovered = if has_preferred || entity.claims.is_empty() {
                    Vec::new()
                } else {
                    discovery.properties().await
                };

                let mut cacheable = true;
                let image = match pick_image_property(&entity.claims, &discovered) {
                    Some((property, file)) => match commons.image(file, ENTITY_IMAGE_SIZE).await {
                        Ok(image) => Some(image),
                        Err(FetchError::NotFound(_)) => {
                            debug!(entity = %id, property = %property, file = %file, "Entity image does not exist");
                            None
                        }
                        Err(e) => {
                            warn!(entity = %id, file = %file, error = %e, "Entity image fetch failed");
                            cacheable = false;
                            None
                        }
                    },
                    None => None,
                };

                let html = wikidata_html(Some(&entity), &language, image.as_ref());
                if cacheable {
                    Computed::cacheable(html)
                } else {
                    Computed::uncacheable(html)
                }
            })
            .await
    }
}

/// Long-lived cache of the Wikidata properties whose values are images
///
/// No freshness floor applies: the list changes rarely and nobody edits it
/// in order to see their change on an annotation.
struct ImagePropertyDiscovery {
    cache: Arc<CacheCoordinator>,
    wikidata: Arc<WikidataClient>,
    property_class: String,
    ttl_secs: u64,
}

impl ImagePropertyDiscovery {
    async fn properties(&self) -> Vec<String> {
        let key = make_key(&[KIND_IMAGE_PROPERTIES, &self.property_class]);
        let wikidata = Arc::clone(&self.wikidata);
        let property_class = self.property_class.clone();

        let value = self
            .cache
            .get_or_compute(&key, CachePolicy::fixed(self.ttl_secs), move || async move {
                match wikidata.image_properties(&property_class).await {
                    Ok(properties) => match serde_json::to_string(&properties) {
                        Ok(json) => Computed::cacheable(json),
                        Err(e) => {
                            warn!(error = %e, "Failed to serialize image properties");
                            Computed::uncacheable("[]")
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, "Image property discovery failed");
                        Computed::uncacheable("[]")
                    }
                }
            })
            .await;

        serde_json::from_str(&value).unwrap_or_default()
    }
}
