//! Per-annotation pipeline: render, classify, enrich

use crate::classifier::classify;
use crate::enrich::Enricher;
use crate::html::plain_paragraph;
use crate::markup::{MarkupRenderer, RenderContext};
use std::sync::Arc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

pub struct Pipeline {
    renderer: Arc<dyn MarkupRenderer>,
    enricher: Arc<Enricher>,
}

impl Pipeline {
    pub fn new(renderer: Arc<dyn MarkupRenderer>, enricher: Arc<Enricher>) -> Self {
        Self { renderer, enricher }
    }

    /// Display HTML for one annotation
    ///
    /// Falls back to the rendered fragment when it is not an enrichable link
    /// or the deadline passes during enrichment, and to escaped plain text
    /// when rendering fails or runs out of time.
    pub async fn parse_annotation(
        &self,
        text: &str,
        context: &RenderContext,
        viewer: Option<&str>,
        deadline: Instant,
    ) -> String {
        let rendered = match timeout_at(deadline, self.renderer.render(text, context)).await {
            Ok(Ok(html)) => html,
            Ok(Err(e)) => {
                warn!(title = %context.title, error = %e, "Markup rendering failed, using plain text");
                return plain_paragraph(text);
            }
            Err(_) => {
                warn!(title = %context.title, "Request deadline passed while rendering");
                return plain_paragraph(text);
            }
        };

        let link = classify(&rendered);
        if link.is_none() {
            return rendered;
        }

        debug!(title = %context.title, link = ?link, "Enriching annotation");

        match timeout_at(deadline, self.enricher.enrich(&link, viewer, &context.language)).await {
            Ok(Some(html)) => html,
            Ok(None) => rendered,
            Err(_) => {
                warn!(title = %context.title, link = ?link, "Request deadline passed while enriching");
                rendered
            }
        }
    }
}
