//! In-process stand-in for the Wikimedia APIs
//!
//! Serves Commons, Wikipedia (any host, under `/<host>/w/api.php`),
//! Wikidata and the query service from canned data, counting requests per
//! kind so tests can assert how often the remote side was hit.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CATEGORY: &str = "category";
pub const IMAGEINFO: &str = "imageinfo";
pub const SUMMARY: &str = "summary";
pub const ENTITY: &str = "entity";
pub const SPARQL: &str = "sparql";

#[derive(Default)]
struct Data {
    categories: HashMap<String, Vec<(String, String)>>,
    images: HashMap<String, (String, String)>,
    articles: HashMap<(String, String), (String, Option<(String, u64, u64)>)>,
    entities: HashMap<String, Value>,
    image_properties: Vec<String>,
}

#[derive(Default)]
pub struct FakeWiki {
    data: Mutex<Data>,
    hits: Mutex<HashMap<&'static str, usize>>,
    failing: AtomicBool,
    delay_ms: AtomicU64,
}

impl FakeWiki {
    pub fn add_category(&self, title: &str, members: &[&str]) {
        let members = members
            .iter()
            .map(|file| {
                (
                    format!("https://commons.wikimedia.org/wiki/File:{}", file),
                    format!("https://upload.wikimedia.org/thumb/100px-{}", file),
                )
            })
            .collect();
        self.data.lock().unwrap().categories.insert(title.to_string(), members);
    }

    pub fn add_image(&self, file: &str) {
        self.data.lock().unwrap().images.insert(
            format!("File:{}", file),
            (
                format!("https://commons.wikimedia.org/wiki/File:{}", file),
                format!("https://upload.wikimedia.org/thumb/200px-{}", file),
            ),
        );
    }

    pub fn add_article(&self, host: &str, title: &str, extract: &str, thumb: Option<&str>) {
        self.data.lock().unwrap().articles.insert(
            (host.to_string(), title.to_string()),
            (extract.to_string(), thumb.map(|t| (t.to_string(), 250, 180))),
        );
    }

    /// `labels` and `descriptions` are (language, text); `claims` are (property, string value)
    pub fn add_entity(&self, id: &str, labels: &[(&str, &str)], descriptions: &[(&str, &str)], claims: &[(&str, &str)]) {
        let terms = |pairs: &[(&str, &str)]| -> Value {
            pairs
                .iter()
                .map(|(lang, text)| (lang.to_string(), json!({"language": lang, "value": text})))
                .collect::<serde_json::Map<String, Value>>()
                .into()
        };
        let claims: serde_json::Map<String, Value> = claims
            .iter()
            .map(|(property, value)| {
                (
                    property.to_string(),
                    json!([{"mainsnak": {"snaktype": "value", "property": property, "datavalue": {"value": value, "type": "string"}}}]),
                )
            })
            .collect();

        self.data.lock().unwrap().entities.insert(
            id.to_string(),
            json!({
                "type": "item",
                "id": id,
                "labels": terms(labels),
                "descriptions": terms(descriptions),
                "claims": claims,
            }),
        );
    }

    pub fn set_image_properties(&self, properties: &[&str]) {
        self.data.lock().unwrap().image_properties = properties.iter().map(|p| p.to_string()).collect();
    }

    /// Make every endpoint answer 500
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay every response
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn hits(&self, kind: &str) -> usize {
        self.hits.lock().unwrap().get(kind).copied().unwrap_or(0)
    }

    /// Start serving on an ephemeral port
    pub async fn serve(self: &Arc<Self>) -> SocketAddr {
        let router = Router::new()
            .route("/commons/w/api.php", get(commons))
            .route("/wikidata/w/api.php", get(wikidata))
            .route("/sparql", get(sparql))
            .route("/:host/w/api.php", get(wikipedia))
            .with_state(Arc::clone(self));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    /// Count the request, apply delay and failure mode, check the wire format
    async fn enter(&self, kind: &'static str, params: &HashMap<String, String>) -> Option<Response> {
        *self.hits.lock().unwrap().entry(kind).or_insert(0) += 1;

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Some((StatusCode::INTERNAL_SERVER_ERROR, "upstream down").into_response());
        }

        if params.get("format").map(String::as_str) != Some("json") {
            return Some((StatusCode::BAD_REQUEST, "format=json required").into_response());
        }

        None
    }
}

type Params = Query<HashMap<String, String>>;

async fn commons(State(fake): State<Arc<FakeWiki>>, Query(params): Params) -> Response {
    let is_category = params.get("generator").map(String::as_str) == Some("categorymembers");
    let kind = if is_category { CATEGORY } else { IMAGEINFO };
    if let Some(response) = fake.enter(kind, &params).await {
        return response;
    }

    let data = fake.data.lock().unwrap();

    if is_category {
        let title = params.get("gcmtitle").cloned().unwrap_or_default();
        let limit: usize = params.get("gcmlimit").and_then(|l| l.parse().ok()).unwrap_or(10);
        let Some(members) = data.categories.get(&title) else {
            return Json(json!({"batchcomplete": true})).into_response();
        };
        let pages: Vec<Value> = members
            .iter()
            .take(limit)
            .enumerate()
            .map(|(i, (description_url, thumb_url))| {
                json!({
                    "ns": 6,
                    "title": format!("File:member{}", i),
                    "index": i + 1,
                    "imageinfo": [{"descriptionurl": description_url, "thumburl": thumb_url, "url": thumb_url}]
                })
            })
            .collect();
        return Json(json!({"batchcomplete": true, "query": {"pages": pages}})).into_response();
    }

    let title = params.get("titles").cloned().unwrap_or_default();
    let page = match data.images.get(&title) {
        Some((description_url, thumb_url)) => json!({
            "ns": 6,
            "title": title,
            "imageinfo": [{"descriptionurl": description_url, "thumburl": thumb_url, "url": thumb_url}]
        }),
        None => json!({"ns": 6, "title": title, "missing": true}),
    };
    Json(json!({"batchcomplete": true, "query": {"pages": [page]}})).into_response()
}

async fn wikipedia(
    State(fake): State<Arc<FakeWiki>>,
    Path(host): Path<String>,
    Query(params): Params,
) -> Response {
    if let Some(response) = fake.enter(SUMMARY, &params).await {
        return response;
    }

    let title = params.get("titles").cloned().unwrap_or_default();
    let data = fake.data.lock().unwrap();
    let page = match data.articles.get(&(host, title.clone())) {
        Some((extract, thumb)) => {
            let mut page = json!({"ns": 0, "title": title, "extract": extract});
            if let Some((source, width, height)) = thumb {
                page["thumbnail"] = json!({"source": source, "width": width, "height": height});
            }
            page
        }
        None => json!({"ns": 0, "title": title, "missing": true}),
    };
    Json(json!({"batchcomplete": true, "query": {"pages": [page]}})).into_response()
}

async fn wikidata(State(fake): State<Arc<FakeWiki>>, Query(params): Params) -> Response {
    if let Some(response) = fake.enter(ENTITY, &params).await {
        return response;
    }

    let id = params.get("ids").cloned().unwrap_or_default();
    let data = fake.data.lock().unwrap();
    let entity = data
        .entities
        .get(&id)
        .cloned()
        .unwrap_or_else(|| json!({"id": id, "missing": ""}));
    let mut entities = serde_json::Map::new();
    entities.insert(id, entity);
    Json(json!({"entities": entities, "success": 1})).into_response()
}

async fn sparql(State(fake): State<Arc<FakeWiki>>, Query(params): Params) -> Response {
    if let Some(response) = fake.enter(SPARQL, &params).await {
        return response;
    }

    let data = fake.data.lock().unwrap();
    let bindings: Vec<Value> = data
        .image_properties
        .iter()
        .map(|p| json!({"property": {"type": "uri", "value": format!("http://www.wikidata.org/entity/{}", p)}}))
        .collect();
    Json(json!({"head": {"vars": ["property"]}, "results": {"bindings": bindings}})).into_response()
}
