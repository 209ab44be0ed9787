//! Write watermark endpoint
//!
//! `POST /api/watermarks` with `X-Viewer-Id`: the viewer just wrote to a
//! remote source, so fragments computed before `at` are too old for them.

use super::viewer_from_headers;
use crate::models::link::KNOWN_SOURCES;
use crate::{ApiError, ApiResult, AppState};
use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct RecordWriteRequest {
    /// `commons`, `wikipedia` or `wikidata`
    pub source: String,
    /// Time of the write; defaults to now
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct RecordWriteResponse {
    pub viewer: String,
    pub source: String,
    /// Watermark after recording
    pub watermark: Option<DateTime<Utc>>,
}

/// POST /api/watermarks
pub async fn record_write(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RecordWriteRequest>,
) -> ApiResult<Json<RecordWriteResponse>> {
    let viewer = viewer_from_headers(&headers)
        .ok_or_else(|| ApiError::BadRequest("X-Viewer-Id header is required".to_string()))?;

    if !KNOWN_SOURCES.contains(&request.source.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "unknown source '{}', expected one of {}",
            request.source,
            KNOWN_SOURCES.join(", ")
        )));
    }

    let at = request.at.unwrap_or_else(|| state.clock.now());
    state.watermarks.record_write(&viewer, &request.source, at).await;
    let watermark = state.watermarks.last_observed_write(&viewer, &request.source).await;

    info!(viewer = %viewer, source = %request.source, at = %at, "Viewer write recorded");

    Ok(Json(RecordWriteResponse {
        viewer,
        source: request.source,
        watermark,
    }))
}

pub fn watermark_routes() -> Router<AppState> {
    Router::new().route("/api/watermarks", post(record_write))
}
