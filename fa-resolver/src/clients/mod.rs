//! Remote Wikimedia API clients
//!
//! Every fetcher issues plain GETs through one shared [`ApiClient`], which
//! owns the reqwest connection pool and the outbound rate limit. Fetchers
//! return typed records; they never panic on odd responses, and ordinary
//! remote failures come back as [`FetchError`] for the caller to turn into
//! an uncacheable fallback.

pub mod commons;
pub mod wikidata;
pub mod wikipedia;

use fa_common::config::HttpSettings;
use governor::{Quota, RateLimiter};
use serde_json::Value;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;

/// Remote fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Status(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Network(e.to_string())
    }
}

type DirectLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Shared HTTP client for the action APIs and the query service
pub struct ApiClient {
    http_client: reqwest::Client,
    rate_limiter: DirectLimiter,
}

impl ApiClient {
    pub fn new(settings: &HttpSettings) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let per_second = NonZeroU32::new(settings.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(per_second));

        Ok(Self {
            http_client,
            rate_limiter,
        })
    }

    /// GET a MediaWiki action API
    ///
    /// Adds `format=json&formatversion=2`. An `{"error": {...}}` body is
    /// reported as a failure even when the status is 200.
    pub async fn get_action_api(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<Value, FetchError> {
        let mut query: Vec<(&str, &str)> = vec![("format", "json"), ("formatversion", "2")];
        query.extend_from_slice(params);

        let body = self.get_json(endpoint, &query).await?;

        if let Some(error) = body.get("error") {
            let code = error.get("code").and_then(Value::as_str).unwrap_or("unknown");
            let info = error.get("info").and_then(Value::as_str).unwrap_or_default();
            return Err(FetchError::Status(200, format!("{}: {}", code, info)));
        }

        Ok(body)
    }

    /// GET any JSON endpoint with the given query parameters
    pub async fn get_json(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value, FetchError> {
        self.rate_limiter.until_ready().await;

        tracing::debug!(url = %endpoint, params = ?params, "Querying remote API");

        let response = self
            .http_client
            .get(endpoint)
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FetchError::Status(status.as_u16(), truncate(&error_text, 200)));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Pages of a `query` response in remote order
///
/// Accepts both response shapes: the normalized shape (`pages` is an array)
/// and the legacy shape (`pages` is an object keyed by page id). Legacy
/// pages produced by a generator carry an `index`; they are ordered by it.
pub fn pages_in_order(body: &Value) -> Vec<&Value> {
    match body.get("query").and_then(|q| q.get("pages")) {
        Some(Value::Array(pages)) => pages.iter().collect(),
        Some(Value::Object(pages)) => {
            let mut pages: Vec<&Value> = pages.values().collect();
            pages.sort_by_key(|page| page.get("index").and_then(Value::as_i64).unwrap_or(i64::MAX));
            pages
        }
        _ => Vec::new(),
    }
}

/// Whether a page object describes a page that does not exist
pub fn is_missing(page: &Value) -> bool {
    match page.get("missing") {
        Some(Value::Bool(missing)) => *missing,
        // Legacy shape marks missing pages with an empty-string flag
        Some(_) => true,
        None => page.get("invalid").is_some(),
    }
}

/// First `imageinfo` record of a page as (description URL, thumbnail URL)
pub fn first_image_info(page: &Value) -> Option<(String, String)> {
    let info = page.get("imageinfo")?.get(0)?;
    let description_url = info.get("descriptionurl")?.as_str()?;
    let thumb_url = info
        .get("thumburl")
        .or_else(|| info.get("url"))?
        .as_str()?;
    Some((description_url.to_string(), thumb_url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        let client = ApiClient::new(&HttpSettings::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_zero_rate_is_clamped() {
        let settings = HttpSettings {
            requests_per_second: 0,
            ..HttpSettings::default()
        };
        assert!(ApiClient::new(&settings).is_ok());
    }

    #[test]
    fn test_pages_in_order_normalized_shape() {
        let body = json!({"query": {"pages": [{"title": "B"}, {"title": "A"}]}});
        let titles: Vec<&str> = pages_in_order(&body)
            .iter()
            .map(|p| p["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["B", "A"]);
    }

    #[test]
    fn test_pages_in_order_legacy_shape_uses_index() {
        let body = json!({"query": {"pages": {
            "10": {"title": "Second", "index": 2},
            "99": {"title": "First", "index": 1},
            "5": {"title": "Third", "index": 3}
        }}});
        let titles: Vec<&str> = pages_in_order(&body)
            .iter()
            .map(|p| p["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn test_pages_in_order_without_query() {
        assert!(pages_in_order(&json!({"batchcomplete": true})).is_empty());
    }

    #[test]
    fn test_is_missing_both_shapes() {
        assert!(is_missing(&json!({"title": "X", "missing": true})));
        assert!(is_missing(&json!({"title": "X", "missing": ""})));
        assert!(is_missing(&json!({"title": "<", "invalid": true})));
        assert!(!is_missing(&json!({"title": "X", "pageid": 1})));
    }

    #[test]
    fn test_first_image_info() {
        let page = json!({"imageinfo": [{
            "descriptionurl": "https://commons.wikimedia.org/wiki/File:Cat.jpg",
            "thumburl": "https://upload.wikimedia.org/thumb/Cat.jpg/100px-Cat.jpg"
        }]});
        assert_eq!(
            first_image_info(&page),
            Some((
                "https://commons.wikimedia.org/wiki/File:Cat.jpg".to_string(),
                "https://upload.wikimedia.org/thumb/Cat.jpg/100px-Cat.jpg".to_string()
            ))
        );
        assert_eq!(first_image_info(&json!({"title": "File:Gone.jpg"})), None);
    }
}
