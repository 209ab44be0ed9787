//! Wikipedia article summary client

use super::{is_missing, pages_in_order, ApiClient, FetchError};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Width of the article's page image, in pixels
pub const ARTICLE_THUMB_SIZE: u32 = 250;

/// Length of the article extract, in sentences
pub const EXTRACT_SENTENCES: u32 = 4;

/// Placeholder substituted with the language wiki host in the endpoint template
pub const HOST_PLACEHOLDER: &str = "{host}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Thumbnail {
    pub source: String,
    pub width: u64,
    pub height: u64,
}

/// Lead extract and page image of an article
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleSummary {
    /// HTML produced by the remote extracts module
    pub extract_html: String,
    pub thumbnail: Option<Thumbnail>,
}

pub struct WikipediaClient {
    api: Arc<ApiClient>,
    endpoint_template: String,
}

impl WikipediaClient {
    /// `endpoint_template` contains `{host}`, e.g. `https://{host}/w/api.php`
    pub fn new(api: Arc<ApiClient>, endpoint_template: impl Into<String>) -> Self {
        Self {
            api,
            endpoint_template: endpoint_template.into(),
        }
    }

    pub fn endpoint_for(&self, host: &str) -> String {
        self.endpoint_template.replace(HOST_PLACEHOLDER, host)
    }

    /// Extract and page image of `article` on the wiki at `host`
    pub async fn summary(&self, host: &str, article: &str) -> Result<ArticleSummary, FetchError> {
        let endpoint = self.endpoint_for(host);
        let thumb_size = ARTICLE_THUMB_SIZE.to_string();
        let sentences = EXTRACT_SENTENCES.to_string();

        let body = self
            .api
            .get_action_api(
                &endpoint,
                &[
                    ("action", "query"),
                    ("titles", article),
                    ("redirects", "1"),
                    ("prop", "pageimages|extracts"),
                    ("piprop", "thumbnail|name"),
                    ("pithumbsize", &thumb_size),
                    ("exsentences", &sentences),
                ],
            )
            .await?;

        let page = pages_in_order(&body)
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::Parse(format!("no page in response for {}", article)))?;

        if is_missing(page) {
            return Err(FetchError::NotFound(format!("{} on {}", article, host)));
        }

        let summary = ArticleSummary {
            extract_html: page
                .get("extract")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            thumbnail: page.get("thumbnail").and_then(parse_thumbnail),
        };

        debug!(
            host = %host,
            article = %article,
            has_thumbnail = summary.thumbnail.is_some(),
            "Fetched Wikipedia summary"
        );

        Ok(summary)
    }
}

fn parse_thumbnail(value: &Value) -> Option<Thumbnail> {
    Some(Thumbnail {
        source: value.get("source")?.as_str()?.to_string(),
        width: value.get("width").and_then(Value::as_u64).unwrap_or(0),
        height: value.get("height").and_then(Value::as_u64).unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fa_common::config::HttpSettings;
    use serde_json::json;

    #[test]
    fn test_endpoint_template_substitution() {
        let api = Arc::new(ApiClient::new(&HttpSettings::default()).unwrap());
        let client = WikipediaClient::new(api, "https://{host}/w/api.php");
        assert_eq!(
            client.endpoint_for("de.wikipedia.org"),
            "https://de.wikipedia.org/w/api.php"
        );
    }

    #[test]
    fn test_parse_thumbnail() {
        let thumb = parse_thumbnail(&json!({"source": "https://upload/x.jpg", "width": 250, "height": 188}));
        assert_eq!(
            thumb,
            Some(Thumbnail {
                source: "https://upload/x.jpg".to_string(),
                width: 250,
                height: 188
            })
        );
        assert_eq!(parse_thumbnail(&json!({"width": 250})), None);
    }
}
