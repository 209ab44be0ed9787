//! Wikimedia Commons client
//!
//! Two lookups: the first few files of a category (for category
//! annotations) and the image info of a single file (for the picture on
//! Wikidata annotations).

use super::{first_image_info, is_missing, pages_in_order, ApiClient, FetchError};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Number of category members shown in a category annotation
pub const CATEGORY_MEMBER_LIMIT: usize = 5;

/// Thumbnail box for category members, in pixels
pub const CATEGORY_THUMB_SIZE: u32 = 100;

/// Thumbnail box for the image of a Wikidata entity, in pixels
pub const ENTITY_IMAGE_SIZE: u32 = 200;

const FILE_PREFIX: &str = "File:";

/// One file of a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryMember {
    pub description_url: String,
    pub thumb_url: String,
}

/// A resolved Commons image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommonsImage {
    pub description_url: String,
    pub thumb_url: String,
}

pub struct CommonsClient {
    api: Arc<ApiClient>,
    endpoint: String,
}

impl CommonsClient {
    pub fn new(api: Arc<ApiClient>, endpoint: impl Into<String>) -> Self {
        Self {
            api,
            endpoint: endpoint.into(),
        }
    }

    /// First files of a category, in the order the API lists them
    ///
    /// `category` is the full title, e.g. `Category:Cats`. Members without
    /// usable image info are skipped; at most [`CATEGORY_MEMBER_LIMIT`] are returned.
    pub async fn category_members(&self, category: &str) -> Result<Vec<CategoryMember>, FetchError> {
        let limit = CATEGORY_MEMBER_LIMIT.to_string();
        let size = CATEGORY_THUMB_SIZE.to_string();

        let body = self
            .api
            .get_action_api(
                &self.endpoint,
                &[
                    ("action", "query"),
                    ("prop", "imageinfo"),
                    ("generator", "categorymembers"),
                    ("gcmtype", "file"),
                    ("gcmtitle", category),
                    ("gcmlimit", &limit),
                    ("iiprop", "url"),
                    ("iiurlwidth", &size),
                    ("iiurlheight", &size),
                ],
            )
            .await?;

        let members: Vec<CategoryMember> = pages_in_order(&body)
            .into_iter()
            .filter_map(first_image_info)
            .map(|(description_url, thumb_url)| CategoryMember {
                description_url,
                thumb_url,
            })
            .take(CATEGORY_MEMBER_LIMIT)
            .collect();

        debug!(category = %category, members = members.len(), "Fetched Commons category members");

        Ok(members)
    }

    /// Image info for one file, scaled into a `size`×`size` box
    ///
    /// `file` may be given with or without the `File:` prefix.
    pub async fn image(&self, file: &str, size: u32) -> Result<CommonsImage, FetchError> {
        let title = if file.starts_with(FILE_PREFIX) {
            file.to_string()
        } else {
            format!("{}{}", FILE_PREFIX, file)
        };
        let size = size.to_string();

        let body = self
            .api
            .get_action_api(
                &self.endpoint,
                &[
                    ("action", "query"),
                    ("prop", "imageinfo"),
                    ("titles", &title),
                    ("iiprop", "url"),
                    ("iiurlwidth", &size),
                    ("iiurlheight", &size),
                ],
            )
            .await?;

        let page = pages_in_order(&body)
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::Parse(format!("no page in image info response for {}", title)))?;

        if is_missing(page) && page.get("imageinfo").is_none() {
            return Err(FetchError::NotFound(title));
        }

        let (description_url, thumb_url) =
            first_image_info(page).ok_or_else(|| FetchError::NotFound(title.clone()))?;

        Ok(CommonsImage {
            description_url,
            thumb_url,
        })
    }
}
