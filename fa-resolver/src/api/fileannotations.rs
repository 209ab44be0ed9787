//! Batch annotation query
//!
//! `GET /api/fileannotations?titles=A.jpg|B.jpg&parse=true&uselang=de`

use super::viewer_from_headers;
use crate::orchestrator::{BatchRequest, BatchResult};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Titles in one request are separated by `|`
const TITLE_SEPARATOR: char = '|';

#[derive(Debug, Deserialize)]
pub struct FileAnnotationsQuery {
    pub titles: Option<String>,
    /// `true`, `1` or empty enables parsing
    pub parse: Option<String>,
    pub uselang: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FileAnnotationsResponse {
    pub fileannotations: BatchResult,
}

fn parse_flag(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("" | "1" | "true" | "yes"))
}

/// GET /api/fileannotations
pub async fn get_file_annotations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<FileAnnotationsQuery>,
) -> ApiResult<Json<FileAnnotationsResponse>> {
    let titles: Vec<String> = query
        .titles
        .as_deref()
        .unwrap_or_default()
        .split(TITLE_SEPARATOR)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    if titles.is_empty() {
        return Err(ApiError::BadRequest("titles parameter is required".to_string()));
    }

    let language = query
        .uselang
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(state.default_language.as_str())
        .to_string();

    let request = BatchRequest {
        titles,
        parse: parse_flag(query.parse.as_deref()),
        language,
        viewer: viewer_from_headers(&headers),
    };

    let fileannotations = state.orchestrator.resolve(&request).await;

    Ok(Json(FileAnnotationsResponse { fileannotations }))
}

pub fn fileannotation_routes() -> Router<AppState> {
    Router::new().route("/api/fileannotations", get(get_file_annotations))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(Some("true")));
        assert!(parse_flag(Some("1")));
        assert!(parse_flag(Some("")));
        assert!(!parse_flag(Some("false")));
        assert!(!parse_flag(Some("0")));
        assert!(!parse_flag(None));
    }
}
