//! Markup-to-HTML rendering of annotation text

use crate::clients::{ApiClient, FetchError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Namespace annotation text is rendered in, so templates and relative links resolve
pub const ANNOTATION_NAMESPACE: &str = "File annotations";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Render request failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Malformed render response: {0}")]
    Malformed(String),
}

/// Page and viewer the markup is rendered for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderContext {
    /// Normalized file title, without namespace
    pub title: String,
    /// Interface language of the viewer
    pub language: String,
}

#[async_trait]
pub trait MarkupRenderer: Send + Sync {
    async fn render(&self, text: &str, context: &RenderContext) -> Result<String, RenderError>;
}

/// Renders through a MediaWiki `action=parse` endpoint
pub struct ParseApiRenderer {
    api: Arc<ApiClient>,
    endpoint: String,
}

impl ParseApiRenderer {
    pub fn new(api: Arc<ApiClient>, endpoint: impl Into<String>) -> Self {
        Self {
            api,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl MarkupRenderer for ParseApiRenderer {
    async fn render(&self, text: &str, context: &RenderContext) -> Result<String, RenderError> {
        let title = format!("{}:{}", ANNOTATION_NAMESPACE, context.title);

        let body = self
            .api
            .get_action_api(
                &self.endpoint,
                &[
                    ("action", "parse"),
                    ("text", text),
                    ("title", &title),
                    ("contentmodel", "wikitext"),
                    ("prop", "text"),
                    ("disablelimitreport", "1"),
                    ("uselang", &context.language),
                ],
            )
            .await?;

        parse_text(&body)
    }
}

/// `parse.text`, which is a string in the normalized shape and `{"*": ...}` in the legacy one
fn parse_text(body: &Value) -> Result<String, RenderError> {
    let text = body
        .get("parse")
        .and_then(|p| p.get("text"))
        .ok_or_else(|| RenderError::Malformed("missing parse.text".to_string()))?;

    match text {
        Value::String(html) => Ok(html.clone()),
        Value::Object(legacy) => legacy
            .get("*")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RenderError::Malformed("missing parse.text.*".to_string())),
        _ => Err(RenderError::Malformed("parse.text is not text".to_string())),
    }
}
