//! Add, edit and delete single annotations
//!
//! Each operation reads the whole page, changes one entry and writes the
//! whole page back against the revision it read. Indexes are positions in
//! the list, so deleting an annotation shifts the ones after it.

use crate::models::{Annotation, AnnotationSet};
use crate::store::{normalize_title, AnnotationStore};
use fa_common::{Error, Result};
use serde::Serialize;

/// Result of a successful write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    pub title: String,
    pub revision: i64,
    /// Number of annotations on the page after the write
    pub count: usize,
}

/// Current annotations of a page for editing; a missing page is an empty set
pub async fn load_for_edit(store: &dyn AnnotationStore, title: &str) -> Result<(String, AnnotationSet)> {
    let title = normalize_title(title)?;
    let set = store.get_annotations(&title).await?.unwrap_or_default();
    Ok((title, set))
}

pub async fn add_annotation(store: &dyn AnnotationStore, title: &str, draft: Annotation) -> Result<WriteOutcome> {
    draft.validate()?;
    let (title, mut set) = load_for_edit(store, title).await?;

    let summary = format!("Added annotation on file page. Text: \"{}\"", draft.content);
    set.annotations.push(draft);

    write(store, title, set, &summary).await
}

pub async fn edit_annotation(
    store: &dyn AnnotationStore,
    title: &str,
    index: usize,
    draft: Annotation,
) -> Result<WriteOutcome> {
    draft.validate()?;
    let (title, mut set) = load_for_edit(store, title).await?;

    let summary = format!("Edited annotation on file page. New text: \"{}\"", draft.content);
    let slot = set
        .annotations
        .get_mut(index)
        .ok_or_else(|| out_of_range(&title, index))?;
    *slot = draft;

    write(store, title, set, &summary).await
}

pub async fn delete_annotation(store: &dyn AnnotationStore, title: &str, index: usize) -> Result<WriteOutcome> {
    let (title, mut set) = load_for_edit(store, title).await?;

    if index >= set.annotations.len() {
        return Err(out_of_range(&title, index));
    }
    set.annotations.remove(index);

    write(store, title, set, "Deleted annotation on file page.").await
}

fn out_of_range(title: &str, index: usize) -> Error {
    Error::NotFound(format!("annotation {} on {}", index, title))
}

async fn write(store: &dyn AnnotationStore, title: String, set: AnnotationSet, summary: &str) -> Result<WriteOutcome> {
    let revision = store.replace_annotations(&title, &set, summary).await?;
    Ok(WriteOutcome {
        title,
        revision,
        count: set.len(),
    })
}
