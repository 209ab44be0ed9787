//! HTTP API handlers for fa-resolver

pub mod annotations;
pub mod fileannotations;
pub mod health;
pub mod watermarks;

pub use annotations::annotation_routes;
pub use fileannotations::fileannotation_routes;
pub use health::health_routes;
pub use watermarks::watermark_routes;

use axum::http::HeaderMap;

/// Header naming the viewer a request is made for
pub const VIEWER_HEADER: &str = "x-viewer-id";

/// Viewer id from [`VIEWER_HEADER`]; blank or non-UTF-8 values count as anonymous
pub fn viewer_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(VIEWER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
