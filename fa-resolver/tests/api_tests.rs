//! Integration tests for the fa-resolver HTTP API
//!
//! Tests cover:
//! - Health endpoint
//! - Batch annotation query (parameters, output shape)
//! - Annotation editing with revision conflicts
//! - Write watermarks

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::IntoResponse,
};
use fa_resolver::build_router;
use fa_resolver::editor;
use fa_resolver::models::Annotation;
use fa_resolver::store::AnnotationStore;
use fa_resolver::watermarks::WriteWatermarks;
use helpers::{lone_link, Harness, StubRenderer, DOUGLAS_ADAMS_HREF};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot` method

/// Test helper: Create request without body
fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Test helper: Create request with JSON body
fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let harness = Harness::start(StubRenderer::new()).await;
    harness.clock.advance_secs(42);
    let app = build_router(harness.state.clone());

    let response = app.oneshot(test_request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "fa-resolver");
    assert!(body["version"].is_string());
    assert_eq!(body["uptime_seconds"], 42);
}

// =============================================================================
// Batch query
// =============================================================================

#[tokio::test]
async fn test_fileannotations_requires_titles() {
    let harness = Harness::start(StubRenderer::new()).await;

    for uri in ["/api/fileannotations", "/api/fileannotations?titles=%7C%20"] {
        let app = build_router(harness.state.clone());
        let response = app.oneshot(test_request("GET", uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);

        let body = extract_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }
}

#[tokio::test]
async fn test_fileannotations_without_parse_returns_raw_annotations() {
    let harness = Harness::start(StubRenderer::new()).await;
    harness.put_page("Zebra.jpg", &["stripes"]).await;
    harness.put_page("Antelope.jpg", &["horns"]).await;
    let app = build_router(harness.state.clone());

    let response = app
        .oneshot(test_request(
            "GET",
            "/api/fileannotations?titles=Zebra.jpg%7CFile:Antelope.jpg",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(
        body,
        json!({"fileannotations": {
            "Antelope.jpg": [{"text": "horns", "index": 0}],
            "Zebra.jpg": [{"text": "stripes", "index": 0}]
        }})
    );
}

#[tokio::test]
async fn test_fileannotations_parse_uses_requested_language() {
    let harness = Harness::start(
        StubRenderer::new().with("[[d:Q42]]", &lone_link(DOUGLAS_ADAMS_HREF, "Q42")),
    )
    .await;
    harness.fake.add_entity(
        "Q42",
        &[("en", "Douglas Adams")],
        &[("en", "English writer"), ("de", "britischer Schriftsteller")],
        &[],
    );
    harness.put_page("Towel.jpg", &["[[d:Q42]]"]).await;
    let app = build_router(harness.state.clone());

    let response = app
        .oneshot(test_request(
            "GET",
            "/api/fileannotations?titles=Towel.jpg&parse=1&uselang=de",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let parsed = body["fileannotations"]["Towel.jpg"][0]["parsed"].as_str().unwrap();
    assert!(parsed.contains(r#"<h2 class="wikidata-label">Douglas Adams</h2>"#));
    assert!(parsed.contains(r#"<p class="wikidata-description">britischer Schriftsteller</p>"#));
}

// =============================================================================
// Annotation editing
// =============================================================================

#[tokio::test]
async fn test_annotation_crud_round() {
    let harness = Harness::start(StubRenderer::new()).await;
    let state = harness.state.clone();

    let response = build_router(state.clone())
        .oneshot(test_request("GET", "/api/annotations/File:New.jpg"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body, json!({"title": "New.jpg", "revision": null, "annotations": []}));

    let response = build_router(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/annotations/New.jpg",
            json!({"content": "A cat", "x": 10, "y": 20, "width": 30, "height": 40}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = extract_json(response.into_body()).await;
    assert_eq!(created["title"], "New.jpg");
    assert_eq!(created["count"], 1);

    let response = build_router(state.clone())
        .oneshot(json_request("PUT", "/api/annotations/New.jpg/0", json!({"content": "A tabby cat"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let edited = extract_json(response.into_body()).await;
    assert!(edited["revision"].as_i64().unwrap() > created["revision"].as_i64().unwrap());

    let set = harness.store.get_annotations("New.jpg").await.unwrap().unwrap();
    assert_eq!(set.annotations, vec![Annotation::new("A tabby cat")]);

    let response = build_router(state.clone())
        .oneshot(test_request("DELETE", "/api/annotations/New.jpg/5"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = build_router(state)
        .oneshot(test_request("DELETE", "/api/annotations/New.jpg/0"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_json(response.into_body()).await["count"], 0);

    let history = harness.store.history("New.jpg").await.unwrap();
    assert_eq!(history.len(), 3);
}

#[tokio::test]
async fn test_empty_annotation_is_rejected() {
    let harness = Harness::start(StubRenderer::new()).await;

    let response = build_router(harness.state.clone())
        .oneshot(json_request("POST", "/api/annotations/Cat.jpg", json!({"content": "  "})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(harness.store.get_annotations("Cat.jpg").await.unwrap().is_none());
}

#[tokio::test]
async fn test_write_against_outdated_revision_conflicts() {
    let harness = Harness::start(StubRenderer::new()).await;
    harness.put_page("Cat.jpg", &["first"]).await;

    // Two editors load the same revision
    let (_, mut mine) = editor::load_for_edit(harness.store.as_ref(), "Cat.jpg").await.unwrap();
    let (_, mut theirs) = editor::load_for_edit(harness.store.as_ref(), "Cat.jpg").await.unwrap();

    theirs.annotations.push(Annotation::new("theirs"));
    harness
        .store
        .replace_annotations("Cat.jpg", &theirs, "their edit")
        .await
        .unwrap();

    mine.annotations.push(Annotation::new("mine"));
    let err = harness
        .store
        .replace_annotations("Cat.jpg", &mine, "my edit")
        .await
        .unwrap_err();
    assert!(matches!(err, fa_common::Error::Conflict(_)));

    // The API reports a conflict the same way
    let response = fa_resolver::ApiError::from(err).into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let stored = harness.store.get_annotations("Cat.jpg").await.unwrap().unwrap();
    let contents: Vec<&str> = stored.annotations.iter().map(|a| a.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "theirs"]);
}

// =============================================================================
// Watermarks
// =============================================================================

#[tokio::test]
async fn test_watermark_requires_viewer() {
    let harness = Harness::start(StubRenderer::new()).await;

    let response = build_router(harness.state.clone())
        .oneshot(json_request("POST", "/api/watermarks", json!({"source": "wikidata"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_watermark_rejects_unknown_source() {
    let harness = Harness::start(StubRenderer::new()).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/watermarks")
        .header("content-type", "application/json")
        .header("x-viewer-id", "Editor")
        .body(Body::from(json!({"source": "wiktionary"}).to_string()))
        .unwrap();
    let response = build_router(harness.state.clone()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert!(body["error"]["message"].as_str().unwrap().contains("wiktionary"));
}

#[tokio::test]
async fn test_watermark_is_recorded_for_viewer() {
    let harness = Harness::start(StubRenderer::new()).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/watermarks")
        .header("content-type", "application/json")
        .header("x-viewer-id", "Editor")
        .body(Body::from(
            json!({"source": "commons", "at": "2024-06-01T12:30:00Z"}).to_string(),
        ))
        .unwrap();
    let response = build_router(harness.state.clone()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["viewer"], "Editor");
    assert_eq!(body["source"], "commons");
    assert_eq!(body["watermark"], "2024-06-01T12:30:00Z");

    let mark = harness.watermarks.last_observed_write("Editor", "commons").await;
    assert_eq!(mark.map(|m| m.to_rfc3339()), Some("2024-06-01T12:30:00+00:00".to_string()));
    assert!(harness.watermarks.last_observed_write("Reader", "commons").await.is_none());
}
