//! Annotation page storage
//!
//! Annotation pages are read and written as whole documents. Writers pass
//! back the revision they read; a write against a newer revision fails with
//! [`Error::Conflict`] so concurrent editors cannot silently overwrite each other.

use crate::models::AnnotationSet;
use async_trait::async_trait;
use fa_common::{Error, Result};

const FILE_NAMESPACE: &str = "File:";

#[async_trait]
pub trait AnnotationStore: Send + Sync {
    /// Annotations of `title`, or `None` when the page does not exist
    async fn get_annotations(&self, title: &str) -> Result<Option<AnnotationSet>>;

    /// Replace the whole document of `title` and return the new revision
    ///
    /// `annotations.revision` must be the revision the caller read (`None`
    /// for a page that did not exist).
    async fn replace_annotations(&self, title: &str, annotations: &AnnotationSet, summary: &str) -> Result<i64>;
}

/// Canonical form of a file title: no namespace, underscores, capitalized
///
/// `" file:my cat.jpg "` → `"My_cat.jpg"`.
pub fn normalize_title(title: &str) -> Result<String> {
    let mut title = title.trim();

    if title.len() >= FILE_NAMESPACE.len()
        && title.is_char_boundary(FILE_NAMESPACE.len())
        && title[..FILE_NAMESPACE.len()].eq_ignore_ascii_case(FILE_NAMESPACE)
    {
        title = title[FILE_NAMESPACE.len()..].trim_start();
    }

    let title = title.replace(' ', "_");
    let title = title.trim_matches('_');

    let mut chars = title.chars();
    let Some(first) = chars.next() else {
        return Err(Error::InvalidInput("title is empty".to_string()));
    };

    Ok(first.to_uppercase().chain(chars).collect())
}
