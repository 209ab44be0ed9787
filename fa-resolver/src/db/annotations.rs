//! Annotation pages in SQLite
//!
//! `annotation_pages` holds the current document of each file;
//! `annotation_revisions` keeps every version with its change summary. The
//! page's `revision` is the id of its latest revision row.

use super::retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use crate::models::{AnnotationDocument, AnnotationSet};
use crate::store::AnnotationStore;
use async_trait::async_trait;
use chrono::Utc;
use fa_common::{Error, Result};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

/// One stored version of an annotation page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevisionRecord {
    pub revision: i64,
    pub summary: String,
    pub document: String,
    pub created_at: String,
}

pub struct SqliteAnnotationStore {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl SqliteAnnotationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            max_lock_wait_ms: DEFAULT_MAX_LOCK_WAIT_MS,
        }
    }

    /// Revisions of `title`, oldest first
    pub async fn history(&self, title: &str) -> Result<Vec<RevisionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT revision, summary, document, created_at
            FROM annotation_revisions
            WHERE title = ?
            ORDER BY revision
            "#,
        )
        .bind(title)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| RevisionRecord {
                revision: row.get("revision"),
                summary: row.get("summary"),
                document: row.get("document"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}

#[async_trait]
impl AnnotationStore for SqliteAnnotationStore {
    async fn get_annotations(&self, title: &str) -> Result<Option<AnnotationSet>> {
        let row = sqlx::query("SELECT document, revision FROM annotation_pages WHERE title = ?")
            .bind(title)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let document: String = row.get("document");
        let document = AnnotationDocument::from_json(&document)?;

        Ok(Some(AnnotationSet {
            annotations: document.annotations,
            revision: Some(row.get("revision")),
        }))
    }

    async fn replace_annotations(&self, title: &str, annotations: &AnnotationSet, summary: &str) -> Result<i64> {
        let document = annotations.document().to_json()?;
        let expected = annotations.revision;
        let pool = &self.pool;
        let document = document.as_str();

        let revision = retry_on_lock("replace_annotations", self.max_lock_wait_ms, move || {
            write_revision(pool, title, expected, document, summary)
        })
        .await?;

        tracing::info!(
            title = %title,
            revision,
            count = annotations.len(),
            summary = %summary,
            "Stored annotation page"
        );

        Ok(revision)
    }
}

/// Append a revision and move the page to it, if the page is still at `expected`
async fn write_revision(
    pool: &SqlitePool,
    title: &str,
    expected: Option<i64>,
    document: &str,
    summary: &str,
) -> Result<i64> {
    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;

    let revision = sqlx::query(
        "INSERT INTO annotation_revisions (title, document, summary, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(title)
    .bind(document)
    .bind(summary)
    .bind(&now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    let updated = match expected {
        Some(expected) => sqlx::query(
            r#"
            UPDATE annotation_pages
            SET document = ?, revision = ?, updated_at = ?
            WHERE title = ? AND revision = ?
            "#,
        )
        .bind(document)
        .bind(revision)
        .bind(&now)
        .bind(title)
        .bind(expected)
        .execute(&mut *tx)
        .await?
        .rows_affected(),
        None => sqlx::query(
            r#"
            INSERT INTO annotation_pages (title, document, revision, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(title) DO NOTHING
            "#,
        )
        .bind(title)
        .bind(document)
        .bind(revision)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .rows_affected(),
    };

    if updated == 0 {
        tx.rollback().await?;
        return Err(Error::Conflict(format!(
            "annotations of {} were changed by someone else (expected revision {:?})",
            title, expected
        )));
    }

    tx.commit().await?;
    Ok(revision)
}
