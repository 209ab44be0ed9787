//! Annotation editing endpoints
//!
//! - `GET    /api/annotations/:title` current document and revision
//! - `POST   /api/annotations/:title` append an annotation
//! - `PUT    /api/annotations/:title/:index` replace one annotation
//! - `DELETE /api/annotations/:title/:index` remove one annotation

use crate::editor::{self, WriteOutcome};
use crate::models::Annotation;
use crate::{ApiResult, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Serialize;

/// Editor view of an annotation page
#[derive(Debug, Serialize)]
pub struct AnnotationPageResponse {
    pub title: String,
    /// `null` when the page has never been written
    pub revision: Option<i64>,
    pub annotations: Vec<Annotation>,
}

/// GET /api/annotations/:title
pub async fn get_annotations(
    State(state): State<AppState>,
    Path(title): Path<String>,
) -> ApiResult<Json<AnnotationPageResponse>> {
    let (title, set) = editor::load_for_edit(state.store.as_ref(), &title).await?;

    Ok(Json(AnnotationPageResponse {
        title,
        revision: set.revision,
        annotations: set.annotations,
    }))
}

/// POST /api/annotations/:title
pub async fn add_annotation(
    State(state): State<AppState>,
    Path(title): Path<String>,
    Json(draft): Json<Annotation>,
) -> ApiResult<(StatusCode, Json<WriteOutcome>)> {
    let outcome = editor::add_annotation(state.store.as_ref(), &title, draft).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// PUT /api/annotations/:title/:index
pub async fn edit_annotation(
    State(state): State<AppState>,
    Path((title, index)): Path<(String, usize)>,
    Json(draft): Json<Annotation>,
) -> ApiResult<Json<WriteOutcome>> {
    let outcome = editor::edit_annotation(state.store.as_ref(), &title, index, draft).await?;
    Ok(Json(outcome))
}

/// DELETE /api/annotations/:title/:index
pub async fn delete_annotation(
    State(state): State<AppState>,
    Path((title, index)): Path<(String, usize)>,
) -> ApiResult<Json<WriteOutcome>> {
    let outcome = editor::delete_annotation(state.store.as_ref(), &title, index).await?;
    Ok(Json(outcome))
}

pub fn annotation_routes() -> Router<AppState> {
    Router::new()
        .route("/api/annotations/:title", get(get_annotations).post(add_annotation))
        .route(
            "/api/annotations/:title/:index",
            put(edit_annotation).delete(delete_annotation),
        )
}
