//! Batch resolution of annotation pages
//!
//! Output is keyed by normalized title in lexicographic order, and each
//! list keeps the stored annotation order, whatever order the concurrent
//! fetches finish in. No single page or annotation can fail the batch.

use crate::markup::RenderContext;
use crate::models::AnnotationData;
use crate::pipeline::Pipeline;
use crate::store::{normalize_title, AnnotationStore};
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// One batch query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub titles: Vec<String>,
    /// Render and enrich each annotation into `parsed`
    pub parse: bool,
    pub language: String,
    pub viewer: Option<String>,
}

pub type BatchResult = BTreeMap<String, Vec<AnnotationData>>;

pub struct Orchestrator {
    store: Arc<dyn AnnotationStore>,
    pipeline: Arc<Pipeline>,
    deadline: Duration,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn AnnotationStore>, pipeline: Arc<Pipeline>, deadline: Duration) -> Self {
        Self {
            store,
            pipeline,
            deadline,
        }
    }

    pub async fn resolve(&self, request: &BatchRequest) -> BatchResult {
        let deadline = Instant::now() + self.deadline;

        let titles: BTreeSet<String> = request
            .titles
            .iter()
            .filter_map(|title| match normalize_title(title) {
                Ok(title) => Some(title),
                Err(e) => {
                    warn!(title = %title, error = %e, "Skipping invalid title");
                    None
                }
            })
            .collect();

        debug!(count = titles.len(), parse = request.parse, language = %request.language, "Resolving annotation batch");

        let resolved = join_all(
            titles
                .iter()
                .map(|title| self.resolve_page(title, request, deadline)),
        )
        .await;

        titles.into_iter().zip(resolved).collect()
    }

    async fn resolve_page(&self, title: &str, request: &BatchRequest, deadline: Instant) -> Vec<AnnotationData> {
        let annotations = match self.store.get_annotations(title).await {
            Ok(Some(set)) => set.annotations,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(title = %title, error = %e, "Could not read annotations");
                return Vec::new();
            }
        };

        let mut data: Vec<AnnotationData> = annotations
            .iter()
            .enumerate()
            .map(|(index, annotation)| AnnotationData::from_annotation(index, annotation))
            .collect();

        if !request.parse {
            return data;
        }

        let context = RenderContext {
            title: title.to_string(),
            language: request.language.clone(),
        };
        let viewer = request.viewer.as_deref();

        let parsed = join_all(
            annotations
                .iter()
                .map(|a| self.pipeline.parse_annotation(&a.content, &context, viewer, deadline)),
        )
        .await;

        for (entry, html) in data.iter_mut().zip(parsed) {
            entry.parsed = Some(html);
        }

        data
    }
}
