//! Wikidata client
//!
//! Entity lookups go through `wbgetentities`; the list of image-valued
//! properties is discovered once through the query service and cached for
//! a long time by the caller.

use super::{ApiClient, FetchError};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Language every entity lookup includes as a fallback
pub const FALLBACK_LANGUAGE: &str = "en";

/// Image properties in order of preference, tried before any discovered ones
///
/// image, flag image, seal image, coat of arms image, logo image, collage
/// image, sectional view, icon, route map.
pub const PREFERRED_IMAGE_PROPERTIES: [&str; 9] = [
    "P18", "P41", "P158", "P94", "P154", "P2716", "P2713", "P2910", "P15",
];

/// Labels, descriptions and string-valued claims of one entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntityRecord {
    pub id: String,
    /// language → label
    pub labels: BTreeMap<String, String>,
    /// language → description
    pub descriptions: BTreeMap<String, String>,
    /// property id → value of its first claim, for string-valued claims
    pub claims: BTreeMap<String, String>,
}

impl EntityRecord {
    /// Viewer-language value, else English
    pub fn label(&self, language: &str) -> Option<&str> {
        prefer_language(&self.labels, language)
    }

    pub fn description(&self, language: &str) -> Option<&str> {
        prefer_language(&self.descriptions, language)
    }
}

fn prefer_language<'a>(values: &'a BTreeMap<String, String>, language: &str) -> Option<&'a str> {
    values
        .get(language)
        .or_else(|| values.get(FALLBACK_LANGUAGE))
        .map(String::as_str)
}

/// First image property present on the entity
///
/// Preferred properties win over discovered ones; returns (property, file name).
pub fn pick_image_property<'a>(
    claims: &'a BTreeMap<String, String>,
    discovered: &[String],
) -> Option<(&'a str, &'a str)> {
    PREFERRED_IMAGE_PROPERTIES
        .iter()
        .copied()
        .chain(discovered.iter().map(String::as_str))
        .find_map(|property| {
            claims
                .get_key_value(property)
                .map(|(key, value)| (key.as_str(), value.as_str()))
        })
}

pub struct WikidataClient {
    api: Arc<ApiClient>,
    endpoint: String,
    sparql_endpoint: String,
}

impl WikidataClient {
    pub fn new(
        api: Arc<ApiClient>,
        endpoint: impl Into<String>,
        sparql_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            api,
            endpoint: endpoint.into(),
            sparql_endpoint: sparql_endpoint.into(),
        }
    }

    /// Labels, descriptions and claims of `id` in English and `language`
    pub async fn entity(&self, id: &str, language: &str) -> Result<EntityRecord, FetchError> {
        let languages = if language == FALLBACK_LANGUAGE {
            FALLBACK_LANGUAGE.to_string()
        } else {
            format!("{}|{}", FALLBACK_LANGUAGE, language)
        };

        let body = self
            .api
            .get_action_api(
                &self.endpoint,
                &[
                    ("action", "wbgetentities"),
                    ("ids", id),
                    ("languages", &languages),
                    ("props", "labels|descriptions|claims"),
                ],
            )
            .await?;

        let entities = body
            .get("entities")
            .and_then(Value::as_object)
            .ok_or_else(|| FetchError::Parse(format!("no entities in response for {}", id)))?;

        // Redirected ids may come back under another key
        let entity = entities
            .get(id)
            .or_else(|| entities.values().next())
            .ok_or_else(|| FetchError::NotFound(id.to_string()))?;

        if entity.get("missing").is_some() {
            return Err(FetchError::NotFound(id.to_string()));
        }

        let record = parse_entity(id, entity);

        debug!(
            entity = %id,
            labels = record.labels.len(),
            claims = record.claims.len(),
            "Fetched Wikidata entity"
        );

        Ok(record)
    }

    /// Property ids that are instances (or subclass instances) of `property_class`
    ///
    /// Order follows the query result; duplicates are dropped.
    pub async fn image_properties(&self, property_class: &str) -> Result<Vec<String>, FetchError> {
        let query = format!(
            "SELECT DISTINCT ?property WHERE {{ ?property wdt:P31/wdt:P279* wd:{} . }}",
            property_class
        );

        let body = self
            .api
            .get_json(&self.sparql_endpoint, &[("query", &query), ("format", "json")])
            .await?;

        let bindings = body
            .get("results")
            .and_then(|r| r.get("bindings"))
            .and_then(Value::as_array)
            .ok_or_else(|| FetchError::Parse("no bindings in SPARQL response".to_string()))?;

        let mut properties: Vec<String> = Vec::new();
        for binding in bindings {
            let Some(uri) = binding
                .get("property")
                .and_then(|p| p.get("value"))
                .and_then(Value::as_str)
            else {
                continue;
            };
            if let Some(id) = property_id_from_uri(uri) {
                if !properties.iter().any(|p| p == id) {
                    properties.push(id.to_string());
                }
            }
        }

        debug!(count = properties.len(), "Discovered image properties");

        Ok(properties)
    }
}

/// `http://www.wikidata.org/entity/P18` → `P18`
fn property_id_from_uri(uri: &str) -> Option<&str> {
    let id = uri.rsplit('/').next()?;
    let digits = id.strip_prefix('P')?;
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        Some(id)
    } else {
        None
    }
}

fn parse_entity(id: &str, entity: &Value) -> EntityRecord {
    EntityRecord {
        id: id.to_string(),
        labels: language_values(entity.get("labels")),
        descriptions: language_values(entity.get("descriptions")),
        claims: first_string_claims(entity.get("claims")),
    }
}

/// `{"en": {"language": "en", "value": "house cat"}}` → `{"en": "house cat"}`
fn language_values(value: Option<&Value>) -> BTreeMap<String, String> {
    value
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(lang, term)| {
                    let text = term.get("value")?.as_str()?;
                    Some((lang.clone(), text.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// First string-valued claim of each property
///
/// A missing claims object and an object with no usable values both give an empty map.
fn first_string_claims(value: Option<&Value>) -> BTreeMap<String, String> {
    let Some(claims) = value.and_then(Value::as_object) else {
        return BTreeMap::new();
    };

    claims
        .iter()
        .filter_map(|(property, statements)| {
            let text = statements
                .as_array()?
                .iter()
                .find_map(|s| s.get("mainsnak")?.get("datavalue")?.get("value")?.as_str())?;
            Some((property.clone(), text.to_string()))
        })
        .collect()
}
